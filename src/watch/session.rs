// src/watch/session.rs

//! Watch session: the owned, explicitly started and stopped unit that turns
//! raw events for a set of roots into a stream of change batches.
//!
//! ```text
//!   source thread ──SourceMessage──▶ driver task ──Output──▶ WatchSession::next()
//!                                     (filter + debouncer)
//! ```
//!
//! The driver task is the only writer to the debouncer. It waits on the
//! source channel, the stop signal and the debounce deadline in a single
//! `select!`, so no periodic tick is needed.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::errors::{MISSING_PATH_REASON, Result, WatchError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::debounce::{DebounceOptions, Debouncer};
use crate::watch::event::{ChangeBatch, RawEvent};
use crate::watch::filter::{FilterPolicy, PathFilter};
use crate::watch::source::{NotifyBackend, RawEventSource, SourceBackend, SourceMessage};

/// Number of formed batches that may wait for the consumer.
const OUTPUT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub debounce: DebounceOptions,
}

/// Lifecycle of a session as observed by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Watching with no open batch.
    Watching,
    /// At least one accepted event is waiting for the window to close.
    BatchOpen,
    /// Stop requested or fatal error; the final batch is being flushed.
    Stopping,
    /// Terminal.
    Stopped,
}

/// Cloneable handle that requests a graceful stop from any task or thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        // `notify_one` stores a permit if the driver is not currently waiting,
        // so a stop issued between two select iterations is not lost.
        self.notify.notify_one();
    }
}

/// What the driver hands to the consumer.
#[derive(Debug)]
enum Output {
    Batch(ChangeBatch),
    Fatal(WatchError),
}

pub struct WatchSession {
    roots: Vec<PathBuf>,
    policy: Arc<FilterPolicy>,
    output_rx: mpsc::Receiver<Output>,
    state_rx: watch::Receiver<SessionState>,
    stop: StopHandle,
    driver: JoinHandle<()>,
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("roots", &self.roots)
            .field("state", &*self.state_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Start watching `paths` recursively with the real filesystem and the
    /// platform's native notification backend.
    pub fn start<I, P>(paths: I, policy: FilterPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::start_with(
            paths,
            policy,
            SessionOptions::default(),
            &RealFileSystem,
            &NotifyBackend,
        )
    }

    /// Start a session with explicit options, filesystem and source backend.
    ///
    /// Every path is validated before any watch is created; on
    /// `InvalidPath` the backend is never opened.
    pub fn start_with<I, P>(
        paths: I,
        policy: FilterPolicy,
        options: SessionOptions,
        fs: &dyn FileSystem,
        backend: &dyn SourceBackend,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = validate_roots(paths, fs)?;
        let policy = Arc::new(policy);
        let filter = PathFilter::new(Arc::clone(&policy), roots.clone())?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WatchError::TimerScheduling(e.to_string()))?;

        let (source_tx, source_rx) = mpsc::unbounded_channel();
        let mut source = backend.open(source_tx)?;
        for root in &roots {
            // On failure `source` is dropped here, removing earlier watches.
            source.watch(root)?;
        }

        info!(
            roots = ?roots,
            mode = %policy.mode,
            debounce_ms = options.debounce.window.as_millis() as u64,
            "watch session started"
        );

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Watching);
        let stop = StopHandle {
            notify: Arc::new(Notify::new()),
        };

        let driver = Driver {
            source: Some(source),
            source_rx,
            filter,
            debouncer: Debouncer::new(options.debounce),
            output_tx,
            state_tx,
            stop: Arc::clone(&stop.notify),
        };
        let driver = runtime.spawn(driver.run());

        Ok(Self {
            roots,
            policy,
            output_rx,
            state_rx,
            stop,
            driver,
        })
    }

    /// Wait for the next change batch.
    ///
    /// - `Ok(Some(batch))`: a debounce window closed with changes.
    /// - `Ok(None)`: the session has ended (after `stop`, or after a fatal
    ///   error has already been returned once).
    /// - `Err(e)`: the session hit a fatal error; reported exactly once.
    pub async fn next(&mut self) -> Result<Option<ChangeBatch>> {
        match self.output_rx.recv().await {
            Some(Output::Batch(batch)) => Ok(Some(batch)),
            Some(Output::Fatal(err)) => Err(err),
            None => Ok(None),
        }
    }

    /// Request a graceful stop. An open batch is flushed and delivered by
    /// `next()` before it reports the end of the session.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Canonical watch roots, in the order they were given.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// True once the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

fn validate_roots<I, P>(paths: I, fs: &dyn FileSystem) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut seen = BTreeSet::new();
    let mut roots = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let invalid = |reason: String| WatchError::InvalidPath {
            path: path.to_path_buf(),
            reason,
        };

        if !fs.exists(path) {
            return Err(invalid(MISSING_PATH_REASON.to_string()));
        }
        fs.check_readable(path).map_err(|e| invalid(e.to_string()))?;
        let canonical = fs.canonicalize(path).map_err(|e| invalid(e.to_string()))?;

        if seen.insert(canonical.clone()) {
            roots.push(canonical);
        }
    }

    if roots.is_empty() {
        return Err(WatchError::Config(
            "at least one path must be watched".to_string(),
        ));
    }
    Ok(roots)
}

/// How the driver loop ended.
enum Ending {
    Stopped,
    Fatal(WatchError),
    ConsumerGone,
}

struct Driver {
    source: Option<Box<dyn RawEventSource>>,
    source_rx: mpsc::UnboundedReceiver<SourceMessage>,
    filter: PathFilter,
    debouncer: Debouncer,
    output_tx: mpsc::Sender<Output>,
    state_tx: watch::Sender<SessionState>,
    stop: Arc<Notify>,
}

impl Driver {
    async fn run(mut self) {
        let mut ending = loop {
            let deadline = self.debouncer.deadline().map(Instant::from_std);

            tokio::select! {
                biased;

                _ = self.stop.notified() => {
                    debug!("stop requested");
                    break Ending::Stopped;
                }

                message = self.source_rx.recv() => match message {
                    Some(SourceMessage::Event(event)) => self.accept(event),
                    Some(SourceMessage::Lost(reason)) => {
                        warn!(%reason, "watch source lost");
                        break Ending::Fatal(WatchError::SourceLost(reason));
                    }
                    None => {
                        break Ending::Fatal(WatchError::SourceLost(
                            "event source closed".to_string(),
                        ));
                    }
                },

                _ = sleep_until(deadline) => {
                    if let Some(batch) = self.debouncer.poll(Instant::now().into_std()) {
                        if !self.emit(batch).await {
                            break Ending::ConsumerGone;
                        }
                    }
                    self.publish_state();
                }
            }
        };

        self.state_tx.send_replace(SessionState::Stopping);
        // Stop watching before the final flush so nothing new can sneak in.
        self.source.take();

        // Messages delivered before the source was dropped still belong to
        // this session.
        while let Ok(message) = self.source_rx.try_recv() {
            match message {
                SourceMessage::Event(event) => {
                    self.record(event);
                }
                SourceMessage::Lost(reason) => {
                    if matches!(ending, Ending::Stopped) {
                        warn!(%reason, "watch source lost during shutdown");
                        ending = Ending::Fatal(WatchError::SourceLost(reason));
                    }
                }
            }
        }

        if let Some(batch) = self.debouncer.flush() {
            debug!(changes = batch.len(), "flushing open batch on shutdown");
            self.emit(batch).await;
        }

        match ending {
            Ending::Fatal(err) => {
                let _ = self.output_tx.send(Output::Fatal(err)).await;
            }
            Ending::Stopped => info!("watch session stopped"),
            Ending::ConsumerGone => debug!("session consumer dropped; exiting driver"),
        }

        self.state_tx.send_replace(SessionState::Stopped);
    }

    fn accept(&mut self, event: RawEvent) {
        if self.record(event) {
            self.publish_state();
        }
    }

    /// Filter and record one event; true if it reached the debouncer.
    fn record(&mut self, event: RawEvent) -> bool {
        match self.filter.admit(event) {
            Some(event) => {
                trace!(?event, "accepted raw event");
                self.debouncer.record(event, Instant::now().into_std());
                true
            }
            None => {
                trace!("raw event filtered out");
                false
            }
        }
    }

    /// Send a batch to the consumer; false if the consumer is gone.
    async fn emit(&mut self, batch: ChangeBatch) -> bool {
        debug!(changes = batch.len(), "emitting change batch");
        self.output_tx.send(Output::Batch(batch)).await.is_ok()
    }

    fn publish_state(&self) {
        let state = if self.debouncer.is_open() {
            SessionState::BatchOpen
        } else {
            SessionState::Watching
        };
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
