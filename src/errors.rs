// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// `InvalidPath` reason for a root that is not on disk.
pub const MISSING_PATH_REASON: &str = "does not exist";

#[derive(Error, Debug)]
pub enum WatchError {
    /// A configured root does not exist or cannot be read at start time.
    #[error("invalid watch path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// The OS-level watch became invalid after the session started.
    #[error("watch source lost: {0}")]
    SourceLost(String),

    /// The debounce timer could not be scheduled.
    #[error("failed to schedule debounce timer: {0}")]
    TimerScheduling(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchError {
    /// True for errors that end a running session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            WatchError::SourceLost(_) | WatchError::TimerScheduling(_)
        )
    }

    /// The offending root, if this is an `InvalidPath` for a missing path.
    pub fn missing_path(&self) -> Option<&Path> {
        match self {
            WatchError::InvalidPath { path, reason } if reason == MISSING_PATH_REASON => {
                Some(path)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
