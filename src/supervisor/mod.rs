// src/supervisor/mod.rs

//! Restart supervisor.
//!
//! Consumes change batches from a [`WatchSession`](crate::watch::WatchSession)
//! and restarts a target once per batch.
//!
//! - [`launcher`] provides the `TargetLauncher` trait and the production
//!   `CommandLauncher`, which runs a shell command; tests swap in a fake.
//! - [`runner`] owns the watch → stop → restart loop.

pub mod launcher;
pub mod runner;

pub use launcher::{CHANGES_ENV, CommandLauncher, LaunchFuture, STOP_TIMEOUT, TargetLauncher, changes_env_value};
pub use runner::{log_reload, run_process};
