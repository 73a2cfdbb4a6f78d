use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use watchrun::errors::WatchError;
use watchrun::supervisor::{LaunchFuture, TargetLauncher};
use watchrun::watch::{ChangeBatch, ChangeKind, PendingChange};

/// One call observed by [`FakeLauncher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchCall {
    /// `start`, with the changes that caused it (empty on the first start).
    Start(Vec<PendingChange>),
    Stop,
}

/// A fake launcher that:
/// - records every start/stop call in order
/// - never spawns anything
/// - can be told to fail the N-th start.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    calls: Arc<Mutex<Vec<LaunchCall>>>,
    fail_start_at: Option<usize>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the start call with the given zero-based index.
    pub fn failing_start(mut self, index: usize) -> Self {
        self.fail_start_at = Some(index);
        self
    }

    pub fn calls(&self) -> Vec<LaunchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, LaunchCall::Start(_)))
            .count()
    }
}

impl TargetLauncher for FakeLauncher {
    fn start<'a>(&'a mut self, changes: Option<&'a ChangeBatch>) -> LaunchFuture<'a> {
        let calls = Arc::clone(&self.calls);
        let fail_at = self.fail_start_at;

        Box::pin(async move {
            let mut guard = calls.lock().unwrap();
            let index = guard
                .iter()
                .filter(|c| matches!(c, LaunchCall::Start(_)))
                .count();
            if fail_at == Some(index) {
                return Err(WatchError::Other(anyhow::anyhow!("start #{index} failed")));
            }

            let changes = changes.map(ChangeBatch::to_changes).unwrap_or_default();
            guard.push(LaunchCall::Start(changes));
            Ok(())
        })
    }

    fn stop(&mut self) -> LaunchFuture<'_> {
        let calls = Arc::clone(&self.calls);
        Box::pin(async move {
            calls.lock().unwrap().push(LaunchCall::Stop);
            Ok::<(), WatchError>(())
        })
    }
}

/// Shorthand for asserting on recorded calls.
pub fn start_with(changes: &[(&str, ChangeKind)]) -> LaunchCall {
    LaunchCall::Start(
        changes
            .iter()
            .map(|(p, k)| PendingChange {
                path: PathBuf::from(p),
                kind: *k,
            })
            .collect(),
    )
}
