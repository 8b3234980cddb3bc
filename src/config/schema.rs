//! KDL schema for config.kdl.

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// output-format "human"  // or "json"
/// done-status "Done"
/// sprint-length-days 14
/// busy-timeout-ms 5000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmsmanConfig {
    pub output_format: Option<OutputFormat>,

    /// Done label given to new projects
    pub done_status: Option<String>,

    /// Sprint length used when `sprint start` gets no end date
    pub sprint_length_days: Option<u32>,

    /// SQLite busy timeout for writers waiting on the lock
    pub busy_timeout_ms: Option<u64>,
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)?.entries().first().map(KdlEntry::value)
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

impl HelmsmanConfig {
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(status) = &self.done_status
            && status.trim().is_empty()
        {
            return Err("done-status cannot be empty".to_string());
        }
        if self.sprint_length_days == Some(0) {
            return Err("sprint-length-days must be at least 1".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes and mistyped values are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            output_format: first_value(doc, "output-format")
                .and_then(KdlValue::as_string)
                .and_then(OutputFormat::parse),
            done_status: first_value(doc, "done-status")
                .and_then(KdlValue::as_string)
                .map(str::to_string),
            sprint_length_days: first_value(doc, "sprint-length-days")
                .and_then(KdlValue::as_integer)
                .and_then(|i| u32::try_from(i).ok()),
            busy_timeout_ms: first_value(doc, "busy-timeout-ms")
                .and_then(KdlValue::as_integer)
                .and_then(|i| u64::try_from(i).ok()),
        }
    }

    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        if let Some(format) = self.output_format {
            push_node(
                &mut doc,
                "output-format",
                KdlValue::String(format.as_str().to_string()),
            );
        }
        if let Some(status) = &self.done_status {
            push_node(&mut doc, "done-status", KdlValue::String(status.clone()));
        }
        if let Some(days) = self.sprint_length_days {
            push_node(&mut doc, "sprint-length-days", KdlValue::Integer(days.into()));
        }
        if let Some(ms) = self.busy_timeout_ms {
            push_node(&mut doc, "busy-timeout-ms", KdlValue::Integer(ms.into()));
        }
        doc
    }

    /// Set a value by its KDL key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "output-format" => {
                self.output_format = Some(OutputFormat::parse(value).ok_or_else(|| {
                    format!("output-format must be json or human, got {}", value)
                })?);
            }
            "done-status" => self.done_status = Some(value.trim().to_string()),
            "sprint-length-days" => {
                self.sprint_length_days = Some(value.parse().map_err(|_| {
                    format!("sprint-length-days must be a number, got {}", value)
                })?);
            }
            "busy-timeout-ms" => {
                self.busy_timeout_ms = Some(
                    value
                        .parse()
                        .map_err(|_| format!("busy-timeout-ms must be a number, got {}", value))?,
                );
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("human"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }

    #[test]
    fn test_config_from_kdl_full() {
        let kdl = r#"
            output-format "human"
            done-status "Shipped"
            sprint-length-days 10
            busy-timeout-ms 250
        "#;
        let doc: KdlDocument = kdl.parse().unwrap();
        let config = HelmsmanConfig::from_kdl(&doc);

        assert_eq!(config.output_format, Some(OutputFormat::Human));
        assert_eq!(config.done_status.as_deref(), Some("Shipped"));
        assert_eq!(config.sprint_length_days, Some(10));
        assert_eq!(config.busy_timeout_ms, Some(250));
    }

    #[test]
    fn test_mistyped_values_ignored() {
        let kdl = r#"
            sprint-length-days "two weeks"
            busy-timeout-ms -5
        "#;
        let doc: KdlDocument = kdl.parse().unwrap();
        assert_eq!(HelmsmanConfig::from_kdl(&doc), HelmsmanConfig::default());
    }

    #[test]
    fn test_set_validates() {
        let mut config = HelmsmanConfig::default();
        config.set("sprint-length-days", "7").unwrap();
        assert_eq!(config.sprint_length_days, Some(7));

        assert!(config.set("sprint-length-days", "0").is_err());
        assert!(config.set("output-format", "xml").is_err());
        assert!(config.set("editor", "vim").is_err());
    }
}
