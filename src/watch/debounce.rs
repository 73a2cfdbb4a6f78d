// src/watch/debounce.rs

//! Pure debounce/coalescing state machine.
//!
//! The [`Debouncer`] turns a stream of filter-accepted [`RawEvent`]s into
//! [`ChangeBatch`]es. It owns no timers, channels or threads: every operation
//! takes the current time explicitly, and the session's driver task is
//! responsible for sleeping until [`Debouncer::deadline`] and calling
//! [`Debouncer::poll`].
//!
//! Per-path upsert rules inside one window:
//!
//! | existing \ incoming | Created  | Modified | Deleted  |
//! |---------------------|----------|----------|----------|
//! | none                | Added    | Modified | Deleted  |
//! | Added               | Added    | Added    | (remove) |
//! | Modified            | Modified | Modified | Deleted  |
//! | Deleted             | Modified | Modified | Deleted  |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::watch::event::{ChangeBatch, ChangeKind, RawEvent, RawEventKind};

/// Default quiet period before an open batch is emitted.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Default upper bound on how long a batch may stay open. `None` means the
/// window only closes once the source has been quiet for the full debounce
/// period.
pub const DEFAULT_MAX_DELAY: Option<Duration> = None;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceOptions {
    /// Sliding quiet period.
    pub window: Duration,
    /// Optional cap measured from the first event of the batch.
    pub max_delay: Option<Duration>,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            window: DEFAULT_DEBOUNCE,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Timing state of the currently open window.
#[derive(Debug, Clone, Copy)]
struct OpenWindow {
    opened_at: Instant,
    last_event_at: Instant,
}

#[derive(Debug)]
pub struct Debouncer {
    options: DebounceOptions,
    pending: BTreeMap<PathBuf, ChangeKind>,
    window: Option<OpenWindow>,
}

impl Debouncer {
    pub fn new(options: DebounceOptions) -> Self {
        Self {
            options,
            pending: BTreeMap::new(),
            window: None,
        }
    }

    /// Whether a window is currently open (it may hold zero entries if every
    /// change so far cancelled out).
    pub fn is_open(&self) -> bool {
        self.window.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Record an accepted event, opening a window if idle and sliding the
    /// deadline to `now + window`.
    pub fn record(&mut self, event: RawEvent, now: Instant) {
        match self.window.as_mut() {
            Some(open) => open.last_event_at = now,
            None => {
                trace!("opening debounce window");
                self.window = Some(OpenWindow {
                    opened_at: now,
                    last_event_at: now,
                });
            }
        }

        let RawEvent { path, kind } = event;
        match kind {
            RawEventKind::Created => self.upsert(path, ChangeKind::Added),
            RawEventKind::Modified => self.upsert(path, ChangeKind::Modified),
            RawEventKind::Deleted => self.upsert(path, ChangeKind::Deleted),
            RawEventKind::Renamed { to: Some(to) } => {
                self.upsert(path, ChangeKind::Deleted);
                self.upsert(to, ChangeKind::Added);
            }
            // Only one half of the rename is known; the path changed, but
            // whether it still exists is a source concern.
            RawEventKind::Renamed { to: None } => self.upsert(path, ChangeKind::Modified),
        }
    }

    fn upsert(&mut self, path: PathBuf, incoming: ChangeKind) {
        use ChangeKind::*;

        let existing = self.pending.get(&path).copied();
        let next = match (existing, incoming) {
            (None, kind) => Some(kind),
            (Some(Added), Added | Modified) => Some(Added),
            (Some(Added), Deleted) => None,
            (Some(Modified), Added | Modified) => Some(Modified),
            (Some(Deleted), Added | Modified) => Some(Modified),
            (Some(Modified | Deleted), Deleted) => Some(Deleted),
        };

        trace!(?path, ?existing, ?incoming, ?next, "upsert pending change");
        match next {
            Some(kind) => {
                self.pending.insert(path, kind);
            }
            None => {
                self.pending.remove(&path);
            }
        }
    }

    /// When the open window closes, or `None` if idle.
    pub fn deadline(&self) -> Option<Instant> {
        let open = self.window?;
        let quiet = open.last_event_at + self.options.window;
        Some(match self.options.max_delay {
            Some(max) => quiet.min(open.opened_at + max),
            None => quiet,
        })
    }

    /// Close the window if its deadline has passed.
    ///
    /// Returns the batch when it is non-empty; an empty window is discarded
    /// and the debouncer goes idle either way.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeBatch> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Close the window immediately, regardless of its deadline.
    pub fn flush(&mut self) -> Option<ChangeBatch> {
        self.window.take()?;
        let pending = std::mem::take(&mut self.pending);
        let batch = ChangeBatch::from_pending(pending);
        if batch.is_none() {
            trace!("debounce window closed with no net changes; discarding");
        }
        batch
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DebounceOptions::default())
    }
}
