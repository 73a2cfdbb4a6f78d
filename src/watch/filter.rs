// src/watch/filter.rs

//! Path relevance policy.
//!
//! [`FilterPolicy`] is the user-facing configuration; [`PathFilter`] is the
//! compiled, immutable decision function applied to every raw event before
//! it reaches the debouncer.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::RegexSet;

use crate::errors::{Result, WatchError};
use crate::types::FilterMode;
use crate::watch::event::{RawEvent, RawEventKind, RawEventKindTag};
use crate::watch::path_utils::{is_under, normalize, relative_to, slash_str};

/// Extensions accepted by [`FilterMode::Python`].
pub const PYTHON_EXTENSIONS: &[&str] = &["py", "pyx", "pyd"];

/// Extensions accepted by [`FilterMode::Default`]: commonly edited source and
/// text files.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "pyx", "pyd", "pyi", "rs", "toml", "c", "h", "cc", "cpp", "hpp", "go", "java", "kt",
    "js", "mjs", "cjs", "ts", "jsx", "tsx", "vue", "svelte", "json", "yaml", "yml", "md", "rst",
    "txt", "html", "htm", "css", "scss", "sass", "less", "sql", "sh", "bash", "zsh", "rb", "php",
    "lua", "swift", "cfg", "ini", "conf", "env", "xml", "csv", "jinja", "j2",
];

/// Directory names that are never relevant outside of [`FilterMode::All`],
/// in addition to every dot-prefixed component.
pub const IGNORED_DIRS: &[&str] = &["__pycache__", "node_modules", "site-packages", "CVS", "_darcs"];

/// File names written by editors and tools while saving.
const EDITOR_NOISE: &[&str] = &[
    r"\.py[cod]$",
    r"\.___jb_...___$",
    r"\.sw.$",
    r"~$",
    r"^\.#",
    r"^\.DS_Store$",
    r"^flycheck_",
];

static EDITOR_NOISE_SET: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(EDITOR_NOISE).expect("editor noise patterns are valid"));

/// Configured filter policy.
///
/// `ignore_paths` are absolute prefixes; anything equal to or nested under
/// one of them is rejected in every mode. `exclude` holds glob patterns
/// evaluated against paths relative to their watch root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    pub mode: FilterMode,
    pub extra_extensions: BTreeSet<String>,
    pub ignore_paths: Vec<PathBuf>,
    pub exclude: Vec<String>,
}

impl FilterPolicy {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Add extra extensions. Leading dots are stripped and extensions are
    /// lowercased, so `.TOML` and `toml` are equivalent.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_extensions
            .extend(extensions.into_iter().filter_map(|e| normalize_extension(e.as_ref())));
        self
    }

    pub fn with_ignore_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.ignore_paths
            .extend(paths.into_iter().map(|p| normalize(&p.into())));
        self
    }

    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }
}

fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() { None } else { Some(ext) }
}

/// Compiled filter for one watch session.
#[derive(Clone)]
pub struct PathFilter {
    policy: Arc<FilterPolicy>,
    roots: Vec<PathBuf>,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("mode", &self.policy.mode)
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl PathFilter {
    /// Compile `policy` for the given watch roots.
    ///
    /// Fails only if one of the `exclude` globs is invalid.
    pub fn new(policy: Arc<FilterPolicy>, roots: Vec<PathBuf>) -> Result<Self> {
        let exclude_set = if policy.exclude.is_empty() {
            None
        } else {
            Some(build_globset(&policy.exclude)?)
        };

        let mut roots: Vec<PathBuf> = roots.iter().map(|r| normalize(r)).collect();
        // Longest first, so nested roots resolve to the innermost one.
        roots.sort_by_key(|r| std::cmp::Reverse(r.components().count()));

        Ok(Self {
            policy,
            roots,
            exclude_set,
        })
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Decide whether an event of the given kind on `path` is relevant.
    pub fn accepts(&self, path: &Path, _kind: RawEventKindTag) -> bool {
        let path = normalize(path);

        let Some(rel) = self.relative(&path) else {
            return false;
        };

        if self.policy.ignore_paths.iter().any(|p| is_under(&path, p)) {
            return false;
        }

        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(slash_str(&rel)) {
                return false;
            }
        }

        match self.policy.mode {
            FilterMode::All => true,
            FilterMode::Default => {
                !is_hidden_or_vcs(&rel)
                    && !is_editor_noise(&path)
                    && has_extension(&path, |ext| DEFAULT_EXTENSIONS.contains(&ext))
            }
            FilterMode::Python => {
                !is_hidden_or_vcs(&rel)
                    && !is_editor_noise(&path)
                    && has_extension(&path, |ext| {
                        PYTHON_EXTENSIONS.contains(&ext)
                            || self.policy.extra_extensions.contains(ext)
                    })
            }
        }
    }

    /// Apply the filter to an event, splitting renames whose halves disagree.
    ///
    /// - rename with both halves accepted: kept as a rename
    /// - only the source accepted: becomes a deletion of the source
    /// - only the destination accepted: becomes a creation of the destination
    pub fn admit(&self, event: RawEvent) -> Option<RawEvent> {
        match event.kind {
            RawEventKind::Renamed { to: Some(to) } => {
                let from_ok = self.accepts(&event.path, RawEventKindTag::Renamed);
                let to_ok = self.accepts(&to, RawEventKindTag::Renamed);
                match (from_ok, to_ok) {
                    (true, true) => Some(RawEvent::renamed(event.path, to)),
                    (true, false) => Some(RawEvent::deleted(event.path)),
                    (false, true) => Some(RawEvent::created(to)),
                    (false, false) => None,
                }
            }
            kind => {
                if self.accepts(&event.path, kind.tag()) {
                    Some(RawEvent {
                        path: event.path,
                        kind,
                    })
                } else {
                    None
                }
            }
        }
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok().map(Path::to_path_buf))
            .or_else(|| self.roots.iter().find_map(|root| relative_to(root, path)))
    }
}

fn is_hidden_or_vcs(rel: &Path) -> bool {
    rel.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            let name: &str = &name;
            name.starts_with('.') || IGNORED_DIRS.contains(&name)
        }
        _ => false,
    })
}

fn is_editor_noise(path: &Path) -> bool {
    path.file_name()
        .map(|name| EDITOR_NOISE_SET.is_match(&name.to_string_lossy()))
        .unwrap_or(false)
}

fn has_extension(path: &Path, accept: impl Fn(&str) -> bool) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| accept(&ext.to_lowercase()))
        .unwrap_or(false)
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|e| WatchError::Config(format!("invalid glob pattern {pat:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| WatchError::Config(format!("building exclude globset: {e}")))
}
