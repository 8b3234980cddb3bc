//! Configuration for Helmsman.
//!
//! ## config.kdl
//!
//! Located at:
//! - System: `~/.config/helmsman/config.kdl`
//! - Session: `<data-dir>/<workspace-hash>/config.kdl`
//!
//! Contains:
//! - `output-format` - "json" or "human"
//! - `done-status` - Done label given to new projects
//! - `sprint-length-days` - Default sprint length for `hm sprint start`
//! - `busy-timeout-ms` - How long a writer waits for the database lock
//!
//! ## Precedence
//!
//! CLI flag > session config > system config > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use kdl::KdlDocument;

use crate::{Error, Result};

pub use resolver::{ConfigOverrides, Resolved, ResolvedConfig, ValueSource, resolve_config};
pub use schema::{HelmsmanConfig, OutputFormat};

/// File name used at both config levels.
pub const CONFIG_FILE: &str = "config.kdl";

/// Path of the system-wide config file, if a config directory exists.
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("helmsman").join(CONFIG_FILE))
}

/// Path of the session config file inside a workspace's storage directory.
pub fn session_config_path(storage_root: &Path) -> PathBuf {
    storage_root.join(CONFIG_FILE)
}

/// Read a config file. A missing file is an empty config.
pub fn read_config(path: &Path) -> Result<HelmsmanConfig> {
    if !path.exists() {
        return Ok(HelmsmanConfig::default());
    }
    let text = fs::read_to_string(path)?;
    let doc: KdlDocument = text
        .parse()
        .map_err(|e| Error::InvalidInput(format!("Invalid KDL in {}: {}", path.display(), e)))?;
    let config = HelmsmanConfig::from_kdl(&doc);
    config
        .validate()
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Write a config file, creating parent directories.
pub fn write_config(path: &Path, config: &HelmsmanConfig) -> Result<()> {
    config.validate().map_err(Error::InvalidInput)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, config.to_kdl().to_string())?;
    tracing::debug!(path = %path.display(), "config written");
    Ok(())
}
