#![allow(dead_code)]

use std::path::Path;

use clap::Parser;
use watchrun::cli::CliArgs;
use watchrun::config::{ConfigFile, RawConfigFile};
use watchrun::fs::mock::MockFileSystem;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.config.run.command = Some(cmd.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.config.watch.paths.push(path.to_string());
        self
    }

    pub fn filter(mut self, mode: watchrun::types::FilterMode) -> Self {
        self.config.watch.filter = Some(mode);
        self
    }

    pub fn extension(mut self, ext: &str) -> Self {
        self.config.watch.extensions.push(ext.to_string());
        self
    }

    pub fn ignore_path(mut self, path: &str) -> Self {
        self.config.watch.ignore_paths.push(path.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = Some(ms);
        self
    }

    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.config.watch.max_delay_ms = Some(ms);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse CLI arguments as if passed on the command line (without the
/// program name).
pub fn cli_args(args: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("watchrun").chain(args.iter().copied()))
        .expect("test CLI arguments should parse")
}

/// A mock tree with the given directories and files under `root`.
pub fn mock_tree(root: &str, dirs: &[&str], files: &[&str]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    let root = Path::new(root);
    fs.add_dir(root);
    for dir in dirs {
        fs.add_dir(root.join(dir));
    }
    for file in files {
        fs.add_file(root.join(file), Vec::new());
    }
    fs
}
