//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Session config.kdl (`<data-dir>/<workspace-hash>/config.kdl`)
//! 3. System config.kdl (`~/.config/helmsman/config.kdl`)
//! 4. Built-in defaults

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::Result;
use crate::config::{HelmsmanConfig, OutputFormat, read_config, session_config_path};
use crate::storage::DEFAULT_BUSY_TIMEOUT_MS;

/// Sprint length when nothing else is configured.
pub const DEFAULT_SPRINT_LENGTH_DAYS: u32 = 14;

/// Done label when nothing else is configured.
pub const DEFAULT_DONE_STATUS: &str = "Done";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    /// Value from session-level config
    Session,
    /// Value from system-level config
    System,
    /// Value from CLI flag
    #[serde(rename = "cli")]
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Session => write!(f, "session"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub output_format: Resolved<OutputFormat>,
    pub done_status: Resolved<String>,
    pub sprint_length_days: Resolved<u32>,
    pub busy_timeout_ms: Resolved<u64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            done_status: Resolved::new(DEFAULT_DONE_STATUS.to_string(), ValueSource::Default),
            sprint_length_days: Resolved::new(DEFAULT_SPRINT_LENGTH_DAYS, ValueSource::Default),
            busy_timeout_ms: Resolved::new(DEFAULT_BUSY_TIMEOUT_MS, ValueSource::Default),
        }
    }
}

impl ResolvedConfig {
    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn done_status(&self) -> &str {
        &self.done_status.value
    }

    pub fn sprint_length_days(&self) -> u32 {
        self.sprint_length_days.value
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms.value)
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_format: Option<OutputFormat>,
    pub done_status: Option<String>,
    pub sprint_length_days: Option<u32>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_sprint_length_days(mut self, days: u32) -> Self {
        self.sprint_length_days = Some(days);
        self
    }
}

/// Pick the highest-precedence value present, else the default.
fn pick<T: Clone>(
    cli: Option<&T>,
    session: Option<&T>,
    system: Option<&T>,
    default: T,
) -> Resolved<T> {
    [
        (cli, ValueSource::CliFlag),
        (session, ValueSource::Session),
        (system, ValueSource::System),
    ]
    .into_iter()
    .find_map(|(value, source)| value.map(|v| Resolved::new(v.clone(), source)))
    .unwrap_or_else(|| Resolved::new(default, ValueSource::Default))
}

/// Resolve already-loaded config layers.
pub fn resolve_layers(
    system: &HelmsmanConfig,
    session: &HelmsmanConfig,
    overrides: &ConfigOverrides,
) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();
    ResolvedConfig {
        output_format: pick(
            overrides.output_format.as_ref(),
            session.output_format.as_ref(),
            system.output_format.as_ref(),
            defaults.output_format.value,
        ),
        done_status: pick(
            overrides.done_status.as_ref(),
            session.done_status.as_ref(),
            system.done_status.as_ref(),
            defaults.done_status.value,
        ),
        sprint_length_days: pick(
            overrides.sprint_length_days.as_ref(),
            session.sprint_length_days.as_ref(),
            system.sprint_length_days.as_ref(),
            defaults.sprint_length_days.value,
        ),
        busy_timeout_ms: pick(
            None,
            session.busy_timeout_ms.as_ref(),
            system.busy_timeout_ms.as_ref(),
            defaults.busy_timeout_ms.value,
        ),
    }
}

/// Resolve configuration with the full precedence chain.
///
/// `storage_root` is the workspace storage directory holding the session
/// config; `None` skips the session layer (workspace not initialized).
pub fn resolve_config(
    system_path: Option<&Path>,
    storage_root: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    let system = match system_path {
        Some(path) => read_config(path)?,
        None => HelmsmanConfig::default(),
    };
    let session = match storage_root {
        Some(root) => read_config(&session_config_path(root))?,
        None => HelmsmanConfig::default(),
    };
    Ok(resolve_layers(&system, &session, overrides))
}
