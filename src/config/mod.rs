// src/config/mod.rs

//! Configuration loading, validation and merging for watchrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file (`loader.rs`).
//! - Validate it (`validate.rs`).
//! - Merge CLI flags over the file over built-in defaults (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, load_optional};
pub use model::{ConfigFile, RawConfigFile, RunSection, WatchSection};
pub use settings::Settings;
