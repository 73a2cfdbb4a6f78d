// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile, RunSection, WatchSection};
use crate::errors::{Result, WatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_watch_section(&raw.watch)?;
        validate_run_section(&raw.run)?;
        Ok(ConfigFile::new_unchecked(raw.watch, raw.run))
    }
}

fn validate_watch_section(watch: &WatchSection) -> Result<()> {
    validate_timings(watch.debounce_ms, watch.max_delay_ms)?;

    for pattern in &watch.exclude {
        Glob::new(pattern).map_err(|e| {
            WatchError::Config(format!("[watch].exclude has invalid glob {pattern:?}: {e}"))
        })?;
    }

    if watch.extensions.iter().any(|e| e.trim().trim_start_matches('.').is_empty()) {
        return Err(WatchError::Config(
            "[watch].extensions must not contain empty entries".to_string(),
        ));
    }

    if watch.paths.iter().any(|p| p.trim().is_empty()) {
        return Err(WatchError::Config(
            "[watch].paths must not contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_run_section(run: &RunSection) -> Result<()> {
    if let Some(cmd) = &run.command {
        if cmd.trim().is_empty() {
            return Err(WatchError::Config(
                "[run].command must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Shared with CLI merging: `debounce_ms >= 1`, `max_delay_ms >= debounce_ms`.
pub fn validate_timings(debounce_ms: Option<u64>, max_delay_ms: Option<u64>) -> Result<()> {
    if debounce_ms == Some(0) {
        return Err(WatchError::Config(
            "debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if let (Some(debounce), Some(max_delay)) = (debounce_ms, max_delay_ms) {
        if max_delay < debounce {
            return Err(WatchError::Config(format!(
                "max_delay_ms ({max_delay}) must be >= debounce_ms ({debounce})"
            )));
        }
    }

    Ok(())
}
