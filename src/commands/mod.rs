//! Command implementations for Helmsman.
//!
//! The engine operations live in the submodules and take an open
//! [`Storage`]; each mutating one runs in a single immediate transaction.
//! Everything a command returns implements [`Output`] so the CLI can print
//! it as JSON or as human text.

pub mod board;
pub mod hierarchy;
pub mod schedule;
pub mod sprint;

use std::path::Path;

use serde::Serialize;

use crate::Result;
use crate::config::ResolvedConfig;
use crate::models::{
    Activity, BoardColumn, ChecklistItem, Dependency, Phase, Project, Sprint, WorkItem,
};
use crate::storage::Storage;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Serialize a result, falling back to an error object.
pub(crate) fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

/// One-line rendering used in listings.
pub trait Summary {
    fn summary(&self) -> String;
}

/// A homogeneous list result.
#[derive(Serialize)]
pub struct Listing<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

impl<T: Serialize + Summary> Output for Listing<T> {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.items.is_empty() {
            return "(none)".to_string();
        }
        self.items
            .iter()
            .map(Summary::summary)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Implement [`Output`] for an entity by pairing JSON with its summary line.
macro_rules! summary_output {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Output for $ty {
                fn to_json(&self) -> String {
                    json(self)
                }

                fn to_human(&self) -> String {
                    self.summary()
                }
            }
        )*
    };
}

summary_output!(Project, BoardColumn, ChecklistItem, Sprint, Phase, Dependency);

impl Summary for Project {
    fn summary(&self) -> String {
        format!(
            "[{}] {} ({}, done label '{}')",
            self.id, self.name, self.methodology, self.done_status
        )
    }
}

impl Summary for BoardColumn {
    fn summary(&self) -> String {
        let wip = self
            .wip_limit
            .map(|l| format!(", WIP {}", l))
            .unwrap_or_default();
        format!(
            "[{}] {} ({} on {}{})",
            self.id, self.name, self.col_type, self.board_type, wip
        )
    }
}

impl Summary for WorkItem {
    fn summary(&self) -> String {
        let indent = "  ".repeat(self.outline_level.saturating_sub(1) as usize);
        format!(
            "{}{} #{} {} [{}]",
            indent, self.wbs_index, self.number, self.title, self.status
        )
    }
}

impl Output for WorkItem {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("#{} {}", self.number, self.title)];
        lines.push(format!("  Status: {}", self.status));
        if let Some(column) = self.column_id {
            lines.push(format!("  Column: {} (position {})", column, self.position));
        }
        if let Some(sprint) = self.sprint_id {
            lines.push(format!("  Sprint: {}", sprint));
        }
        if let Some(points) = self.story_points {
            lines.push(format!("  Points: {}", points));
        }
        if self.wsjf.job_size > 0 {
            lines.push(format!("  WSJF: {:.2}", self.wsjf.score()));
        }
        lines.push(format!(
            "  WBS: {} (level {})",
            self.wbs_index, self.outline_level
        ));
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            lines.push(format!("  Dates: {} .. {}", start, end));
        }
        if self.is_archived() {
            lines.push("  Archived".to_string());
        }
        lines.join("\n")
    }
}

impl Summary for ChecklistItem {
    fn summary(&self) -> String {
        let mark = if self.checked { "x" } else { " " };
        format!("[{}] {} {} ({})", mark, self.id, self.label, self.kind)
    }
}

impl Summary for Sprint {
    fn summary(&self) -> String {
        let dates = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!(" {} .. {}", start, end),
            _ => String::new(),
        };
        format!("[{}] {} {}{}", self.id, self.name, self.status, dates)
    }
}

impl Summary for Phase {
    fn summary(&self) -> String {
        let gate = if self.is_gate { " gate" } else { "" };
        format!(
            "[{}] {} {} .. {} {}%{}",
            self.id, self.name, self.start_date, self.end_date, self.progress, gate
        )
    }
}

impl Summary for Dependency {
    fn summary(&self) -> String {
        let lag = match self.lag {
            0 => String::new(),
            lag => format!(" lag {:+}", lag),
        };
        format!(
            "{} -> {} ({}{})",
            self.predecessor, self.successor, self.dep_type, lag
        )
    }
}

impl Summary for Activity {
    fn summary(&self) -> String {
        let change = match (&self.from_value, &self.to_value) {
            (Some(from), Some(to)) => format!(": {} -> {}", from, to),
            (None, Some(to)) => format!(": {}", to),
            _ => String::new(),
        };
        format!(
            "{} #{} {}{}",
            self.created_at.format("%Y-%m-%d %H:%M"),
            self.work_item,
            self.action,
            change
        )
    }
}

/// Result of `hm system init`.
#[derive(Serialize)]
pub struct InitResult {
    pub initialized: bool,
    pub storage_path: String,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.initialized {
            format!("Initialized helmsman at {}", self.storage_path)
        } else {
            format!("Already initialized at {}", self.storage_path)
        }
    }
}

/// Create storage for a workspace. Idempotent.
pub fn system_init(workspace: &Path) -> Result<InitResult> {
    let existed = Storage::exists(workspace)?;
    let storage = Storage::init(workspace)?;
    tracing::info!(path = %storage.root().display(), existed, "storage initialized");
    Ok(InitResult {
        initialized: !existed,
        storage_path: storage.root().display().to_string(),
    })
}

/// Result of `hm system info`.
#[derive(Serialize)]
pub struct SystemInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub built_at: &'static str,
    pub initialized: bool,
    pub storage_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

impl Output for SystemInfo {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let state = match &self.schema_version {
            Some(version) => format!("schema v{}", version),
            None => "not initialized".to_string(),
        };
        format!(
            "hm {} ({}, built {})\nStorage: {} ({})",
            self.version, self.commit, self.built_at, self.storage_path, state
        )
    }
}

/// Version, build metadata, and storage location for a workspace.
pub fn system_info(workspace: &Path) -> Result<SystemInfo> {
    let initialized = Storage::exists(workspace)?;
    let schema_version = if initialized {
        Some(Storage::open(workspace)?.schema_version()?)
    } else {
        None
    };
    Ok(SystemInfo {
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("HM_GIT_COMMIT"),
        built_at: env!("HM_BUILD_TIMESTAMP"),
        initialized,
        storage_path: crate::storage::get_storage_dir(workspace)?
            .display()
            .to_string(),
        schema_version,
    })
}

impl Output for ResolvedConfig {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        [
            format!(
                "output-format = {} ({})",
                self.output_format.value, self.output_format.source
            ),
            format!(
                "done-status = {} ({})",
                self.done_status.value, self.done_status.source
            ),
            format!(
                "sprint-length-days = {} ({})",
                self.sprint_length_days.value, self.sprint_length_days.source
            ),
            format!(
                "busy-timeout-ms = {} ({})",
                self.busy_timeout_ms.value, self.busy_timeout_ms.source
            ),
        ]
        .join("\n")
    }
}

/// Acknowledgement for operations with nothing else to report.
#[derive(Serialize)]
pub struct Ack {
    pub ok: bool,
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

impl Output for Ack {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        self.message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Methodology;
    use crate::test_utils::{TestEnv, item, seed_board};

    #[test]
    fn test_listing_output() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        item(&mut storage, board.project.id, "Login page");

        let listing: Listing<WorkItem> = storage
            .list_work_items(board.project.id, false)
            .unwrap()
            .into();
        assert!(listing.to_json().contains(r#""count":1"#));
        assert_eq!(listing.to_human(), "1 #1 Login page [Backlog]");
    }

    #[test]
    fn test_empty_listing_human() {
        let listing: Listing<Sprint> = Vec::new().into();
        assert_eq!(listing.to_human(), "(none)");
    }

    #[test]
    fn test_column_summary_shows_wip() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        let column = storage
            .set_wip_limit(board.project.id, board.doing, Some(3))
            .unwrap();
        assert!(column.to_human().contains("WIP 3"));
    }
}
