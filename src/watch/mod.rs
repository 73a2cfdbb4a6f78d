// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Normalising platform notifications into [`RawEvent`]s ([`source`]).
//! - Deciding which paths are relevant ([`filter`]).
//! - Coalescing bursts of events into [`ChangeBatch`]es ([`debounce`]).
//! - Owning all of the above for a set of roots ([`session`]).
//!
//! It does **not** know about the target process; it only turns filesystem
//! changes into batches for a consumer such as [`crate::supervisor`].

pub mod debounce;
pub mod event;
pub mod filter;
pub mod path_utils;
pub mod session;
pub mod source;

pub use debounce::{DEFAULT_DEBOUNCE, DEFAULT_MAX_DELAY, DebounceOptions, Debouncer};
pub use event::{ChangeBatch, ChangeKind, PendingChange, RawEvent, RawEventKind, RawEventKindTag};
pub use filter::{DEFAULT_EXTENSIONS, FilterPolicy, IGNORED_DIRS, PYTHON_EXTENSIONS, PathFilter};
pub use session::{SessionOptions, SessionState, StopHandle, WatchSession};
pub use source::{NotifyBackend, RawEventSource, SourceBackend, SourceMessage, SourceSender};
