// src/config/settings.rs

//! Effective settings: CLI flags over config file over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::cli::CliArgs;
use crate::config::model::ConfigFile;
use crate::config::validate::validate_timings;
use crate::errors::{Result, WatchError};
use crate::fs::FileSystem;
use crate::supervisor::STOP_TIMEOUT;
use crate::types::FilterMode;
use crate::watch::path_utils::absolutize;
use crate::watch::{DEFAULT_DEBOUNCE, DEFAULT_MAX_DELAY, DebounceOptions, FilterPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub command: String,
    /// Roots as given (made absolute); existence is checked when the watch
    /// session starts.
    pub paths: Vec<PathBuf>,
    pub policy: FilterPolicy,
    pub debounce: DebounceOptions,
    pub stop_timeout: Duration,
}

impl Settings {
    pub fn resolve(
        args: &CliArgs,
        file: Option<&ConfigFile>,
        fs: &dyn FileSystem,
        cwd: &Path,
    ) -> Result<Self> {
        let watch = file.map(ConfigFile::watch);
        let run = file.map(ConfigFile::run);

        let command = args
            .command
            .clone()
            .or_else(|| run.and_then(|r| r.command.clone()))
            .ok_or_else(|| {
                WatchError::Config(
                    "no command given (pass COMMAND or set [run].command)".to_string(),
                )
            })?;

        let raw_paths: Vec<String> = if !args.paths.is_empty() {
            args.paths.clone()
        } else {
            watch
                .map(|w| w.paths.clone())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| vec![".".to_string()])
        };
        let paths = raw_paths
            .iter()
            .map(|p| absolutize(Path::new(p), cwd))
            .collect();

        let mode = args
            .filter
            .or_else(|| watch.and_then(|w| w.filter))
            .unwrap_or_default();

        let extensions = pick(&args.extensions, watch.map(|w| &w.extensions));
        let extensions = if !extensions.is_empty() && mode != FilterMode::Python {
            warn!(
                "\"--extensions\" argument ignored as \"{}\" filter was selected",
                mode
            );
            Vec::new()
        } else {
            extensions
        };

        let ignore_paths: Vec<PathBuf> = pick(&args.ignore_paths, watch.map(|w| &w.ignore_paths))
            .iter()
            .map(|p| resolve_ignore_path(fs, Path::new(p), cwd))
            .collect();

        let exclude = watch.map(|w| w.exclude.clone()).unwrap_or_default();

        let debounce_ms = args.debounce_ms.or_else(|| watch.and_then(|w| w.debounce_ms));
        let max_delay_ms = args.max_delay_ms.or_else(|| watch.and_then(|w| w.max_delay_ms));
        validate_timings(debounce_ms, max_delay_ms)?;
        let debounce = DebounceOptions {
            window: debounce_ms.map(Duration::from_millis).unwrap_or(DEFAULT_DEBOUNCE),
            max_delay: max_delay_ms.map(Duration::from_millis).or(DEFAULT_MAX_DELAY),
        };

        let stop_timeout = run
            .and_then(|r| r.stop_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(STOP_TIMEOUT);

        let policy = FilterPolicy::new(mode)
            .with_extensions(extensions)
            .with_ignore_paths(ignore_paths)
            .with_exclude(exclude);

        Ok(Self {
            command,
            paths,
            policy,
            debounce,
            stop_timeout,
        })
    }
}

/// CLI list if given, else the config file's list.
fn pick(cli: &[String], file: Option<&Vec<String>>) -> Vec<String> {
    if !cli.is_empty() {
        cli.to_vec()
    } else {
        file.cloned().unwrap_or_default()
    }
}

/// Ignore paths are compared against canonical event paths, so resolve
/// symlinks when the directory exists.
fn resolve_ignore_path(fs: &dyn FileSystem, path: &Path, cwd: &Path) -> PathBuf {
    let abs = absolutize(path, cwd);
    fs.canonicalize(&abs).unwrap_or(abs)
}
