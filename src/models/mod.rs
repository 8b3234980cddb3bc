//! Data models for Helmsman entities.
//!
//! This module defines the core data structures:
//! - `Project` - Tenant boundary carrying the methodology and the Done label
//! - `BoardColumn` - A board lane with a semantic type and optional WIP limit
//! - `WorkItem` - Story/task shared by the board, sprint, and WBS views
//! - `ChecklistItem` - Definition of Done / Definition of Ready entries
//! - `Phase` - Waterfall/Hybrid timeline segment
//! - `Dependency` - Precedence edge between two phases or two work items
//! - `Sprint` / `SprintSnapshot` - Agile iteration and its burndown samples
//! - `Activity` - Append-only history record

pub mod graph;
pub mod outline;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest lag or duration accepted, in days.
pub const MAX_OFFSET_DAYS: i64 = 100 * 366;

/// `date` moved by `days`, or `None` when the result leaves the calendar range.
pub fn shift_date(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

/// Delivery methodology of a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Methodology {
    #[default]
    Agile,
    Waterfall,
    Hybrid,
}

impl Methodology {
    /// Returns true if story points and WSJF apply to this methodology.
    pub fn tracks_points(&self) -> bool {
        !matches!(self, Methodology::Waterfall)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Methodology::Agile => "AGILE",
            Methodology::Waterfall => "WATERFALL",
            Methodology::Hybrid => "HYBRID",
        }
    }
}

impl fmt::Display for Methodology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Methodology {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agile" | "scrum" => Ok(Methodology::Agile),
            "waterfall" => Ok(Methodology::Waterfall),
            "hybrid" => Ok(Methodology::Hybrid),
            _ => Err(format!("Unknown methodology: {}", s)),
        }
    }
}

/// Semantic type of a board column (independent of its display name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Backlog,
    Todo,
    Doing,
    Done,
}

impl ColumnType {
    /// Returns true for the terminal column type guarded by the Definition of Done.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ColumnType::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Backlog => "BACKLOG",
            ColumnType::Todo => "TODO",
            ColumnType::Doing => "DOING",
            ColumnType::Done => "DONE",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backlog" => Ok(ColumnType::Backlog),
            "todo" | "to_do" | "to-do" => Ok(ColumnType::Todo),
            "doing" | "in_progress" | "in-progress" => Ok(ColumnType::Doing),
            "done" => Ok(ColumnType::Done),
            _ => Err(format!("Unknown column type: {}", s)),
        }
    }
}

/// A project: the tenant boundary every engine call is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub methodology: Methodology,

    /// Status label that marks a work item as finished for point accounting
    pub done_status: String,

    /// Anchor used by the scheduler for root nodes without a start date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_start: Option<NaiveDate>,

    /// Number of sprints ever created in this project (drives default sprint names)
    pub sprint_count: u32,

    pub created_at: DateTime<Utc>,
}

/// One lane of a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardColumn {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub col_type: ColumnType,

    /// Per-methodology board this column belongs to (e.g. "kanban", "sprint")
    pub board_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,

    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Weighted Shortest Job First components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wsjf {
    #[serde(default)]
    pub business_value: u32,
    #[serde(default)]
    pub time_criticality: u32,
    #[serde(default)]
    pub risk_reduction: u32,
    #[serde(default)]
    pub job_size: u32,
}

impl Wsjf {
    /// Cost of delay divided by job size; zero when no job size is set.
    pub fn score(&self) -> f64 {
        if self.job_size == 0 {
            return 0.0;
        }
        let cost_of_delay = self.business_value + self.time_criticality + self.risk_reduction;
        cost_of_delay as f64 / self.job_size as f64
    }
}

/// A unit of work: an Agile story or a Waterfall task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub project_id: i64,

    /// Per-project sequence number (e.g. #7)
    pub number: i64,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form status label
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<i64>,

    /// Position within the current column
    pub position: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,

    #[serde(default)]
    pub wsjf: Wsjf,

    /// Planned length in days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_start_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_end_date: Option<NaiveDate>,

    #[serde(default)]
    pub is_milestone: bool,

    /// Parent task number in the WBS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_number: Option<i64>,

    /// Depth in the WBS (root = 1)
    pub outline_level: u32,

    /// Pre-order position in the flattened WBS list
    pub outline_position: i64,

    /// Dotted outline index (e.g. "2.3")
    pub wbs_index: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Points counted toward sprint totals.
    pub fn points(&self) -> u32 {
        self.story_points.unwrap_or(0)
    }
}

/// Kind of quality checklist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecklistKind {
    /// Definition of Done: gates entry into a DONE column
    Dod,
    /// Definition of Ready: recorded only
    Dor,
}

impl ChecklistKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistKind::Dod => "DOD",
            ChecklistKind::Dor => "DOR",
        }
    }
}

impl fmt::Display for ChecklistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChecklistKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dod" => Ok(ChecklistKind::Dod),
            "dor" => Ok(ChecklistKind::Dor),
            _ => Err(format!("Unknown checklist kind: {}", s)),
        }
    }
}

/// A checklist entry attached to a work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: i64,
    pub project_id: i64,
    pub work_item: i64,
    pub kind: ChecklistKind,
    pub label: String,
    pub checked: bool,
    pub created_at: DateTime<Utc>,
}

/// A Waterfall/Hybrid timeline segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_start_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_end_date: Option<NaiveDate>,

    /// Completion percentage (0-100)
    pub progress: u8,

    #[serde(default)]
    pub is_gate: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Which kind of schedulable entity a dependency edge connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Phase,
    WorkItem,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Phase => "phase",
            NodeKind::WorkItem => "work_item",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phase" => Ok(NodeKind::Phase),
            "work_item" | "work-item" | "item" | "task" => Ok(NodeKind::WorkItem),
            _ => Err(format!("Unknown node kind: {}", s)),
        }
    }
}

/// Precedence constraint type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyType {
    /// Successor starts after predecessor finishes
    #[default]
    #[serde(rename = "FS")]
    FinishToStart,
    #[serde(rename = "SS")]
    StartToStart,
    #[serde(rename = "FF")]
    FinishToFinish,
    #[serde(rename = "SF")]
    StartToFinish,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FS",
            DependencyType::StartToStart => "SS",
            DependencyType::FinishToFinish => "FF",
            DependencyType::StartToFinish => "SF",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FS" | "FINISH_TO_START" => Ok(DependencyType::FinishToStart),
            "SS" | "START_TO_START" => Ok(DependencyType::StartToStart),
            "FF" | "FINISH_TO_FINISH" => Ok(DependencyType::FinishToFinish),
            "SF" | "START_TO_FINISH" => Ok(DependencyType::StartToFinish),
            _ => Err(format!("Unknown dependency type: {}", s)),
        }
    }
}

/// A directed precedence edge between two phases or two work items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub project_id: i64,
    pub kind: NodeKind,
    pub predecessor: i64,
    pub successor: i64,
    pub dep_type: DependencyType,

    /// Signed offset in days
    pub lag: i64,

    pub created_at: DateTime<Utc>,
}

/// Sprint lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SprintStatus {
    #[default]
    Planning,
    Active,
    Closed,
}

impl SprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SprintStatus::Planning => "PLANNING",
            SprintStatus::Active => "ACTIVE",
            SprintStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SprintStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planning" => Ok(SprintStatus::Planning),
            "active" => Ok(SprintStatus::Active),
            "closed" => Ok(SprintStatus::Closed),
            _ => Err(format!("Unknown sprint status: {}", s)),
        }
    }
}

/// A bounded Agile iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: i64,
    pub project_id: i64,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    /// Owning phase (Hybrid projects)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<i64>,

    pub status: SprintStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Per-day burndown sample, unique on `(sprint_id, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintSnapshot {
    pub sprint_id: i64,
    pub date: NaiveDate,
    pub total_points: u32,
    pub completed_points: u32,
}

impl SprintSnapshot {
    pub fn remaining_points(&self) -> u32 {
        self.total_points.saturating_sub(self.completed_points)
    }
}

/// Where an unfinished work item goes when its sprint is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloverAction {
    NextSprint,
    Backlog,
}

impl std::str::FromStr for RolloverAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "next_sprint" | "next" => Ok(RolloverAction::NextSprint),
            "backlog" => Ok(RolloverAction::Backlog),
            _ => Err(format!("Unknown rollover action: {}", s)),
        }
    }
}

/// A single rollover instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverDecision {
    pub work_item: i64,
    pub action: RolloverAction,
}

/// An append-only history record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub project_id: i64,
    pub work_item: i64,

    /// What happened (e.g. "moved", "rolled_over", "indented")
    pub action: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_value: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Advisory schedule finding returned alongside a successful edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleWarning {
    /// The successor currently starts before the new constraint allows
    ConstraintViolated {
        node: i64,
        current_start: NaiveDate,
        required_start: NaiveDate,
    },
    /// The successor already satisfies the new constraint with slack to spare
    SlackBeforeStart {
        node: i64,
        current_start: NaiveDate,
        earliest_start: NaiveDate,
        slack_days: i64,
    },
    /// A predecessor has no dates, so the constraint cannot be evaluated
    UndatedPredecessor { node: i64, predecessor: i64 },
    /// Auto-schedule replaced a manually set start date
    ManualDateOverridden {
        node: i64,
        previous_start: NaiveDate,
        new_start: NaiveDate,
    },
}

impl fmt::Display for ScheduleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleWarning::ConstraintViolated {
                node,
                current_start,
                required_start,
            } => write!(
                f,
                "{} starts {} but the dependency requires {} or later",
                node, current_start, required_start
            ),
            ScheduleWarning::SlackBeforeStart {
                node, slack_days, ..
            } => write!(f, "{} has {} day(s) of slack before it starts", node, slack_days),
            ScheduleWarning::UndatedPredecessor { node, predecessor } => write!(
                f,
                "{} depends on {} which has no dates yet",
                node, predecessor
            ),
            ScheduleWarning::ManualDateOverridden {
                node,
                previous_start,
                new_start,
            } => write!(
                f,
                "{} moved from {} to {} by auto-schedule",
                node, previous_start, new_start
            ),
        }
    }
}
