// src/watch/event.rs

//! Event and batch types shared by the source, filter and debouncer.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Kind of a raw filesystem notification, after platform normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Modified,
    Deleted,
    /// The event path was renamed; `to` is the destination when the platform
    /// reported both halves of the rename.
    Renamed { to: Option<PathBuf> },
}

impl RawEventKind {
    /// Payload-free tag, used by the filter.
    pub fn tag(&self) -> RawEventKindTag {
        match self {
            RawEventKind::Created => RawEventKindTag::Created,
            RawEventKind::Modified => RawEventKindTag::Modified,
            RawEventKind::Deleted => RawEventKindTag::Deleted,
            RawEventKind::Renamed { .. } => RawEventKindTag::Renamed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKindTag {
    Created,
    Modified,
    Deleted,
    Renamed,
}

/// A single unprocessed filesystem notification for an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RawEventKind::Created,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RawEventKind::Modified,
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RawEventKind::Deleted,
        }
    }

    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            path: from.into(),
            kind: RawEventKind::Renamed {
                to: Some(to.into()),
            },
        }
    }
}

/// Net effect of a window's worth of events on a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deduplicated entry of a change batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Immutable snapshot of the changes collected during one debounce window.
///
/// Never empty: the only constructor is crate-private and used by the
/// debouncer, which discards empty windows instead of emitting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    changes: BTreeMap<PathBuf, ChangeKind>,
}

impl ChangeBatch {
    pub(crate) fn from_pending(changes: BTreeMap<PathBuf, ChangeKind>) -> Option<Self> {
        if changes.is_empty() {
            None
        } else {
            Some(Self { changes })
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<ChangeKind> {
        self.changes.get(path.as_ref()).copied()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.changes.contains_key(path.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, ChangeKind)> {
        self.changes.iter().map(|(p, k)| (p.as_path(), *k))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.changes.keys().map(PathBuf::as_path)
    }

    pub fn to_changes(&self) -> Vec<PendingChange> {
        self.iter()
            .map(|(path, kind)| PendingChange {
                path: path.to_path_buf(),
                kind,
            })
            .collect()
    }
}

impl IntoIterator for ChangeBatch {
    type Item = (PathBuf, ChangeKind);
    type IntoIter = btree_map::IntoIter<PathBuf, ChangeKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
