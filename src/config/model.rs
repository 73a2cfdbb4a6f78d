// src/config/model.rs

use serde::Deserialize;

use crate::types::FilterMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// paths = ["src", "templates"]
/// filter = "python"
/// extensions = ["toml", "html"]
/// ignore_paths = ["src/generated"]
/// exclude = ["**/*_pb2.py"]
/// debounce_ms = 100
///
/// [run]
/// command = "python -m app"
/// ```
///
/// All sections and keys are optional; CLI flags take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub run: RunSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Roots to watch; relative paths resolve against the working directory.
    #[serde(default)]
    pub paths: Vec<String>,

    /// `"python"`, `"default"` or `"all"`.
    #[serde(default)]
    pub filter: Option<FilterMode>,

    /// Extra extensions for the `python` filter.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Directories whose contents are never reported.
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Glob patterns, relative to each root, whose matches are never reported.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Quiet period before a batch is emitted.
    #[serde(default)]
    pub debounce_ms: Option<u64>,

    /// Upper bound on how long a batch may stay open.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

/// `[run]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    /// Shell command to run and restart.
    #[serde(default)]
    pub command: Option<String>,

    /// How long to wait for a stopped target to exit.
    #[serde(default)]
    pub stop_timeout_ms: Option<u64>,
}

/// A validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    watch: WatchSection,
    run: RunSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, run: RunSection) -> Self {
        Self { watch, run }
    }

    pub fn watch(&self) -> &WatchSection {
        &self.watch
    }

    pub fn run(&self) -> &RunSection {
        &self.run
    }
}
