// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{Settings, load_optional};
use crate::fs::RealFileSystem;
use crate::supervisor::{CommandLauncher, log_reload, run_process};
use crate::watch::{SessionOptions, WatchSession};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI merging
/// - the watch session
/// - the restart supervisor with a shell-command launcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs = RealFileSystem;
    let cwd = std::env::current_dir().context("reading current directory")?;

    let config_path = args.config.as_ref().map(PathBuf::from);
    let file = load_optional(&fs, config_path.as_deref(), &cwd)?;
    let settings = Settings::resolve(&args, file.as_ref(), &fs, &cwd)?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    let options = SessionOptions {
        debounce: settings.debounce,
    };
    let mut session = match WatchSession::start_with(
        &settings.paths,
        settings.policy.clone(),
        options,
        &fs,
        &watch::NotifyBackend,
    ) {
        Ok(session) => session,
        Err(e) => match e.missing_path() {
            Some(path) => anyhow::bail!("path \"{}\" does not exist", path.display()),
            None => return Err(e.into()),
        },
    };

    let paths_str = session
        .roots()
        .iter()
        .map(|p| format!("\"{}\"", p.display()))
        .collect::<Vec<_>>()
        .join(", ");
    info!(
        "watching {} and reloading \"{}\" on changes...",
        paths_str, settings.command
    );

    // Ctrl-C → graceful shutdown.
    {
        let stop = session.stop_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            stop.stop();
        });
    }

    let mut launcher =
        CommandLauncher::new(settings.command.clone()).with_stop_timeout(settings.stop_timeout);
    let reloads = run_process(&mut session, &mut launcher, log_reload).await?;

    info!(reloads, "watchrun exiting");
    Ok(())
}

/// Print the effective settings without watching or running anything.
fn print_dry_run(settings: &Settings) {
    println!("watchrun dry-run");
    println!("  command = {}", settings.command);
    println!("  paths:");
    for path in &settings.paths {
        println!("    - {}", path.display());
    }
    println!("  filter = {}", settings.policy.mode);
    if !settings.policy.extra_extensions.is_empty() {
        println!("  extensions = {:?}", settings.policy.extra_extensions);
    }
    if !settings.policy.ignore_paths.is_empty() {
        println!("  ignore_paths = {:?}", settings.policy.ignore_paths);
    }
    if !settings.policy.exclude.is_empty() {
        println!("  exclude = {:?}", settings.policy.exclude);
    }
    println!("  debounce_ms = {}", settings.debounce.window.as_millis());
    if let Some(max) = settings.debounce.max_delay {
        println!("  max_delay_ms = {}", max.as_millis());
    }
}
