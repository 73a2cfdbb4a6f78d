// src/config/loader.rs

use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WatchError};
use crate::fs::FileSystem;

/// Config file picked up from the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "Watchrun.toml";

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs.read_to_string(path).map_err(|e| {
        WatchError::Config(format!("reading config file {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and validate it.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(fs, &path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the config named on the command line, or fall back to
/// [`DEFAULT_CONFIG_FILE`] in `cwd` if it exists.
///
/// An explicitly named file must exist; a missing default file is not an
/// error.
pub fn load_optional(
    fs: &dyn FileSystem,
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<Option<ConfigFile>> {
    if let Some(path) = explicit {
        debug!(?path, "loading config file");
        return load_and_validate(fs, path).map(Some);
    }

    let default_path = cwd.join(DEFAULT_CONFIG_FILE);
    if fs.exists(&default_path) {
        debug!(path = ?default_path, "loading default config file");
        return load_and_validate(fs, &default_path).map(Some);
    }

    Ok(None)
}
