// src/supervisor/launcher.rs

//! Pluggable target launcher.
//!
//! The supervisor talks to a `TargetLauncher` instead of spawning processes
//! itself, so tests can record start/stop calls without running anything.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::{Result, WatchError};
use crate::watch::{ChangeBatch, ChangeKind};

/// Environment variable carrying the batch that caused a restart, as a JSON
/// array of `[kind, path]` pairs (`"[]"` on the first start).
pub const CHANGES_ENV: &str = "WATCHRUN_CHANGES";

/// How long an interrupted target gets to exit before it is killed.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

pub type LaunchFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how the target is started and stopped.
pub trait TargetLauncher: Send {
    /// Start the target. `changes` is `None` for the initial start.
    fn start<'a>(&'a mut self, changes: Option<&'a ChangeBatch>) -> LaunchFuture<'a>;

    /// Stop the target if it is running.
    fn stop(&mut self) -> LaunchFuture<'_>;
}

/// Serialise a batch for [`CHANGES_ENV`], e.g.
/// `[["added","/src/a.py"],["deleted","/src/b.py"]]`.
pub fn changes_env_value(changes: Option<&ChangeBatch>) -> Result<String> {
    let pairs: Vec<(ChangeKind, String)> = changes
        .map(|batch| {
            batch
                .to_changes()
                .into_iter()
                .map(|change| (change.kind, change.path.to_string_lossy().into_owned()))
                .collect()
        })
        .unwrap_or_default();

    serde_json::to_string(&pairs)
        .map_err(|e| WatchError::Other(anyhow::anyhow!("serialising changes: {e}")))
}

/// Runs the target as a shell command.
///
/// On unix the shell is started in its own process group, and stopping
/// signals the whole group: SIGINT first, SIGKILL once `stop_timeout` has
/// passed, and SIGKILL again for anything the shell left behind.
pub struct CommandLauncher {
    command: String,
    child: Option<Child>,
    pid: Option<u32>,
    stop_timeout: Duration,
}

impl fmt::Debug for CommandLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLauncher")
            .field("command", &self.command)
            .field("running", &self.child.is_some())
            .finish()
    }
}

impl CommandLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            child: None,
            pid: None,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn shell_command(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        }
    }
}

impl TargetLauncher for CommandLauncher {
    fn start<'a>(&'a mut self, changes: Option<&'a ChangeBatch>) -> LaunchFuture<'a> {
        Box::pin(async move {
            let env_value = changes_env_value(changes)?;

            let mut cmd = self.shell_command();
            cmd.env(CHANGES_ENV, env_value)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
            #[cfg(unix)]
            cmd.process_group(0);

            let child = cmd.spawn()?;
            info!(cmd = %self.command, pid = ?child.id(), "target started");
            self.pid = child.id();
            self.child = Some(child);
            Ok(())
        })
    }

    fn stop(&mut self) -> LaunchFuture<'_> {
        Box::pin(async move {
            let Some(mut child) = self.child.take() else {
                return Ok(());
            };
            let pid = self.pid.take();

            match child.try_wait()? {
                Some(status) => {
                    warn!(exit_code = ?status.code(), "process already dead");
                }
                None => {
                    debug!(?pid, "stopping process...");
                    interrupt(&mut child, pid);
                    match tokio::time::timeout(self.stop_timeout, child.wait()).await {
                        Ok(Ok(status)) => debug!(exit_code = ?status.code(), "process stopped"),
                        Ok(Err(e)) => warn!(error = %e, "failed waiting for target process"),
                        Err(_) => {
                            warn!(
                                timeout_ms = self.stop_timeout.as_millis() as u64,
                                "process has not terminated, sending SIGKILL"
                            );
                            force_kill(&mut child, pid);
                            if let Err(e) = child.wait().await {
                                warn!(error = %e, "failed waiting for killed target process");
                            }
                        }
                    }
                }
            }

            kill_leftovers(pid);
            Ok(())
        })
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: Signal) {
    let Some(pid) = pid else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(error = %e, ?signal, "failed to signal target process group"),
    }
}

#[cfg(unix)]
fn interrupt(_child: &mut Child, pid: Option<u32>) {
    signal_group(pid, Signal::SIGINT);
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child, _pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to kill target process");
    }
}

#[cfg(unix)]
fn force_kill(child: &mut Child, pid: Option<u32>) {
    signal_group(pid, Signal::SIGKILL);
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child, _pid: Option<u32>) {
    let _ = child.start_kill();
}

/// Background jobs of the shell may outlive it; they share its group.
#[cfg(unix)]
fn kill_leftovers(pid: Option<u32>) {
    signal_group(pid, Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_leftovers(_pid: Option<u32>) {}
