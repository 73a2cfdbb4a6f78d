use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use watchrun::errors::{Result, WatchError};
use watchrun::watch::{RawEvent, RawEventSource, SourceBackend, SourceMessage, SourceSender};

#[derive(Debug, Default)]
struct FakeState {
    tx: Option<SourceSender>,
    opened: usize,
    watched: Vec<PathBuf>,
    fail_watch: Option<PathBuf>,
    live_sources: usize,
}

/// A scriptable event source backend.
///
/// The test keeps a clone of the backend and pushes events into whichever
/// session opened it:
///
/// ```ignore
/// let backend = FakeBackend::new();
/// let mut session = WatchSession::start_with(paths, policy, opts, &fs, &backend)?;
/// backend.emit(RawEvent::modified("/repo/a.py"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `watch(path)` fail, to exercise partial-setup cleanup.
    pub fn fail_watch_on(&self, path: impl Into<PathBuf>) {
        self.state.lock().unwrap().fail_watch = Some(path.into());
    }

    /// How many times a source was opened.
    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    /// Roots passed to `watch`, in order.
    pub fn watched(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().watched.clone()
    }

    /// Number of sources that are open and not yet dropped.
    pub fn live_sources(&self) -> usize {
        self.state.lock().unwrap().live_sources
    }

    /// Push a raw event. Returns false if no session is listening.
    pub fn emit(&self, event: RawEvent) -> bool {
        self.send(SourceMessage::Event(event))
    }

    /// Report that the OS watch was lost.
    pub fn lose(&self, reason: &str) -> bool {
        self.send(SourceMessage::Lost(reason.to_string()))
    }

    /// Drop the sender, closing the source channel.
    pub fn close(&self) {
        self.state.lock().unwrap().tx = None;
    }

    fn send(&self, message: SourceMessage) -> bool {
        let state = self.state.lock().unwrap();
        match &state.tx {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }
}

impl SourceBackend for FakeBackend {
    fn open(&self, tx: SourceSender) -> Result<Box<dyn RawEventSource>> {
        let mut state = self.state.lock().unwrap();
        state.tx = Some(tx);
        state.opened += 1;
        state.live_sources += 1;
        Ok(Box::new(FakeSource {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl RawEventSource for FakeSource {
    fn watch(&mut self, root: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_watch.as_deref() == Some(root) {
            return Err(WatchError::InvalidPath {
                path: root.to_path_buf(),
                reason: "watch refused".to_string(),
            });
        }
        state.watched.push(root.to_path_buf());
        Ok(())
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.live_sources -= 1;
            // Like a real watcher: once the source is gone, nothing more is sent.
            state.tx = None;
        }
    }
}
