// src/watch/source.rs

//! Raw event sources.
//!
//! A [`SourceBackend`] opens a [`RawEventSource`] that pushes
//! [`SourceMessage`]s into the session's channel from whatever thread the
//! platform notification machinery runs on. Production code uses
//! [`NotifyBackend`]; tests plug in a scripted backend instead.
//!
//! Platform differences (atomic renames vs. delete/create pairs, directory
//! events, access notifications) are absorbed by [`translate`], so everything
//! downstream only ever sees the uniform [`RawEvent`] shape.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::errors::{Result, WatchError};
use crate::watch::event::RawEvent;

/// Message flowing from a source into the session driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMessage {
    Event(RawEvent),
    /// The underlying OS watch is gone; the session must end.
    Lost(String),
}

pub type SourceSender = mpsc::UnboundedSender<SourceMessage>;

/// A live source of raw events. Dropping it stops watching.
pub trait RawEventSource: Send {
    /// Begin watching `root` recursively.
    fn watch(&mut self, root: &Path) -> Result<()>;
}

/// Factory for raw event sources, one per session.
pub trait SourceBackend {
    fn open(&self, tx: SourceSender) -> Result<Box<dyn RawEventSource>>;
}

/// Backend built on `notify`'s recommended watcher for the host platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyBackend;

impl SourceBackend for NotifyBackend {
    fn open(&self, tx: SourceSender) -> Result<Box<dyn RawEventSource>> {
        let roots: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));

        // Called synchronously on notify's own thread for every event.
        let watcher = RecommendedWatcher::new(
            {
                let roots = Arc::clone(&roots);
                move |res: notify::Result<Event>| {
                    let messages = match res {
                        Ok(event) => messages_for_event(&event, &roots),
                        Err(err) => message_for_error(err).into_iter().collect(),
                    };
                    for message in messages {
                        if tx.send(message).is_err() {
                            trace!("session gone; dropping notify message");
                            return;
                        }
                    }
                }
            },
            Config::default(),
        )?;

        Ok(Box::new(NotifySource { watcher, roots }))
    }
}

/// Keeps the `RecommendedWatcher` alive for as long as the session runs.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    roots: Arc<Mutex<Vec<PathBuf>>>,
}

impl fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySource").finish_non_exhaustive()
    }
}

impl RawEventSource for NotifySource {
    fn watch(&mut self, root: &Path) -> Result<()> {
        self.watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::InvalidPath {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        match self.roots.lock() {
            Ok(mut roots) => roots.push(root.to_path_buf()),
            Err(_) => warn!("root list mutex poisoned; root removal will not be detected"),
        }
        debug!(?root, "notify watch added");
        Ok(())
    }
}

fn messages_for_event(event: &Event, roots: &Mutex<Vec<PathBuf>>) -> Vec<SourceMessage> {
    if let EventKind::Remove(_) = event.kind {
        if let Ok(roots) = roots.lock() {
            if let Some(root) = event.paths.iter().find(|p| roots.contains(p)) {
                return vec![SourceMessage::Lost(format!(
                    "watched root {} was removed",
                    root.display()
                ))];
            }
        }
    }

    if event.need_rescan() {
        warn!("notify reported dropped events; some changes may be missed");
    }

    translate(event)
        .into_iter()
        .map(SourceMessage::Event)
        .collect()
}

fn message_for_error(err: notify::Error) -> Option<SourceMessage> {
    use notify::ErrorKind;
    use std::io::ErrorKind as IoKind;

    let fatal = match &err.kind {
        ErrorKind::PathNotFound | ErrorKind::WatchNotFound | ErrorKind::MaxFilesWatch => true,
        ErrorKind::Io(io) => matches!(io.kind(), IoKind::NotFound | IoKind::PermissionDenied),
        _ => false,
    };

    if fatal {
        Some(SourceMessage::Lost(err.to_string()))
    } else {
        warn!(error = %err, "file watch error");
        None
    }
}

/// Convert one `notify` event into zero or more raw events.
///
/// - renames reported with both paths become a single `Renamed`
/// - rename halves become `Deleted` (source) / `Created` (destination)
/// - events on directories, access events and unknown kinds are dropped
pub fn translate(event: &Event) -> Vec<RawEvent> {
    match &event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),

        EventKind::Create(_) => file_paths(event).map(RawEvent::created).collect(),

        EventKind::Remove(_) => event.paths.iter().cloned().map(RawEvent::deleted).collect(),

        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(*mode, &event.paths),

        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => Vec::new(),

        EventKind::Modify(_) => file_paths(event).map(RawEvent::modified).collect(),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => {
            trace!(kind = ?event.kind, "dropping unrecognised notify event");
            Vec::new()
        }
    }
}

fn translate_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<RawEvent> {
    match (mode, paths) {
        (RenameMode::Both, [from, to, ..]) => {
            if to.is_dir() {
                Vec::new()
            } else {
                vec![RawEvent::renamed(from.clone(), to.clone())]
            }
        }
        // The source is already gone, so a directory moved away cannot be
        // told apart from a file and is reported as one deleted path.
        (RenameMode::From, [from, ..]) => vec![RawEvent::deleted(from.clone())],
        (RenameMode::To, [to, ..]) if !to.is_dir() => vec![RawEvent::created(to.clone())],
        // Platforms that only report "something was renamed here": decide by
        // whether the path still exists.
        (RenameMode::Any | RenameMode::Other, _) => paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| {
                if p.exists() {
                    RawEvent::created(p.clone())
                } else {
                    RawEvent::deleted(p.clone())
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn file_paths(event: &Event) -> impl Iterator<Item = PathBuf> + '_ {
    event.paths.iter().filter(|p| !p.is_dir()).cloned()
}
