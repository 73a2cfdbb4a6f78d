// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

/// Lexically normalise a path: drop `.` components and fold `..` into the
/// preceding component. Does not touch the filesystem, so it works for
/// paths that no longer exist (e.g. deleted files).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Turn a possibly relative path into a normalised absolute one, using `base`
/// for relative inputs.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// True if `path` equals `prefix` or is nested under it (component-wise, so
/// `/repo/build2` is not under `/repo/build`).
pub fn is_under(path: &Path, prefix: &Path) -> bool {
    path.starts_with(prefix)
}

/// Path of `path` relative to `root`.
///
/// First tries a direct `strip_prefix(root)`. If that fails (e.g. symlinks or
/// `/private/var` vs `/var` on macOS) and both paths can be canonicalised,
/// tries again on the canonical forms.
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_path_buf());
        }
    }

    None
}

/// Forward-slash string form of a relative path, for glob matching.
pub fn slash_str(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
