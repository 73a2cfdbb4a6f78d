// src/supervisor/runner.rs

use tracing::{debug, info};

use crate::errors::Result;
use crate::supervisor::launcher::TargetLauncher;
use crate::watch::{ChangeBatch, SessionState, WatchSession};

/// Default reload callback: one log line per batch.
pub fn log_reload(batch: &ChangeBatch) {
    info!("{} files changed, reloading", batch.len());
}

/// Start the target, then restart it once per change batch until the
/// session ends.
///
/// Returns the number of restarts. A fatal session error stops the target
/// and is returned as-is. A batch delivered while the session is already
/// shutting down (the flush on stop) is passed to `callback` but does not
/// restart the target.
pub async fn run_process<L, F>(
    session: &mut WatchSession,
    launcher: &mut L,
    mut callback: F,
) -> Result<usize>
where
    L: TargetLauncher,
    F: FnMut(&ChangeBatch),
{
    launcher.start(None).await?;

    let mut reloads = 0;
    let outcome = loop {
        match session.next().await {
            Ok(Some(batch)) => {
                callback(&batch);

                if matches!(
                    session.state(),
                    SessionState::Stopping | SessionState::Stopped
                ) {
                    debug!("session is shutting down; not restarting target");
                    continue;
                }

                if let Err(e) = launcher.stop().await {
                    break Err(e);
                }
                if let Err(e) = launcher.start(Some(&batch)).await {
                    break Err(e);
                }
                reloads += 1;
            }
            Ok(None) => break Ok(reloads),
            Err(e) => break Err(e),
        }
    };

    let stopped = launcher.stop().await;
    let reloads = outcome?;
    stopped?;
    debug!(reloads, "supervisor finished");
    Ok(reloads)
}
