// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::FilterMode;

/// Command-line arguments for `watchrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchrun",
    version,
    about = "Watch one or more directories and restart a command on file changes.",
    long_about = "Watch one or more directories and restart a command on file changes.\n\n\
                  Note: only changes to python files will prompt the command to be restarted\n\
                  by default, use `--extensions` or `--filter` to watch more file types."
)]
pub struct CliArgs {
    /// Shell command to run and restart on changes.
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    /// Filesystem paths to watch, defaults to the current directory.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// Which files to watch: python, default or all.
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<FilterMode>,

    /// Directories to ignore (comma-separated or repeated).
    #[arg(long, value_name = "PATH", value_delimiter = ',', num_args = 1..)]
    pub ignore_paths: Vec<String>,

    /// Extra file extensions to watch, applies only with `--filter python`.
    #[arg(long, value_name = "EXT", value_delimiter = ',', num_args = 1..)]
    pub extensions: Vec<String>,

    /// Quiet period in milliseconds before a batch of changes is acted on.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Upper bound in milliseconds on how long changes are grouped.
    #[arg(long, value_name = "MS")]
    pub max_delay_ms: Option<u64>,

    /// Path to a config file (TOML).
    ///
    /// Default: `Watchrun.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the effective settings, but don't watch or run.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
