//! CLI argument definitions for Helmsman.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::models::{ChecklistKind, ColumnType, DependencyType, Methodology, NodeKind};

/// Helmsman - workflow and scheduling engine for hybrid Agile/Waterfall projects.
///
/// Start with `hm system init`, then `hm project create`.
#[derive(Parser, Debug)]
#[command(name = "hm")]
#[command(
    author,
    version,
    about = "Board gating, sprints, and dependency scheduling",
    long_about = None
)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if hm was started in <path> instead of the current directory.
    /// Can also be set via HM_WORKSPACE environment variable.
    #[arg(short = 'C', long = "workspace", global = true, env = "HM_WORKSPACE")]
    pub workspace: Option<std::path::PathBuf>,

    /// Log engine decisions to stderr at debug level (overrides HM_LOG)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Board column management
    Column {
        #[command(subcommand)]
        command: ColumnCommands,
    },

    /// Work item management and board moves
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Definition of Done / Definition of Ready checklists
    Checklist {
        #[command(subcommand)]
        command: ChecklistCommands,
    },

    /// Sprint lifecycle
    Sprint {
        #[command(subcommand)]
        command: SprintCommands,
    },

    /// Timeline phases
    Phase {
        #[command(subcommand)]
        command: PhaseCommands,
    },

    /// Precedence dependencies between phases or work items
    Dep {
        #[command(subcommand)]
        command: DepCommands,
    },

    /// Auto-scheduling and baselines
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Work Breakdown Structure outline
    Wbs {
        #[command(subcommand)]
        command: WbsCommands,
    },

    /// Show the activity history of a project
    Log {
        /// Project id
        #[arg(short, long)]
        project: i64,

        /// Only show entries for this work item
        item: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize storage for this workspace (idempotent)
    Init,

    /// Show version, build, and storage information
    Info,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show every resolved setting and where it came from
    List,

    /// Set a session-level value (output-format, done-status, sprint-length-days, busy-timeout-ms)
    Set {
        key: String,
        value: String,

        /// Write to the system config instead of the session config
        #[arg(long)]
        system: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Create {
        name: String,

        /// agile, waterfall, or hybrid
        #[arg(short, long, default_value = "agile")]
        methodology: Methodology,

        /// Status label that counts as done (defaults to the configured done-status)
        #[arg(long)]
        done_status: Option<String>,

        /// Anchor date for undated root tasks (YYYY-MM-DD)
        #[arg(long)]
        default_start: Option<NaiveDate>,
    },

    /// List projects
    List,

    /// Show a project
    Show { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ColumnCommands {
    /// Append a column to a board
    Add {
        #[arg(short, long)]
        project: i64,

        name: String,

        /// backlog, todo, doing, or done
        #[arg(short = 't', long = "type")]
        col_type: ColumnType,

        #[arg(short, long, default_value = "kanban")]
        board: String,

        /// Maximum number of items in the column
        #[arg(long)]
        wip: Option<u32>,
    },

    /// List columns
    List {
        #[arg(short, long)]
        project: i64,

        /// Only this board
        #[arg(short, long)]
        board: Option<String>,
    },

    /// Set or clear a column's WIP limit
    Wip {
        #[arg(short, long)]
        project: i64,

        id: i64,

        /// New limit; omit to clear
        limit: Option<u32>,
    },

    /// Delete an empty column
    Delete {
        #[arg(short, long)]
        project: i64,

        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    /// Create a work item
    Add {
        #[arg(short, long)]
        project: i64,

        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Status label (defaults to the column name)
        #[arg(short, long)]
        status: Option<String>,

        /// Column id (defaults to the first backlog column)
        #[arg(long)]
        column: Option<i64>,

        #[arg(long)]
        sprint: Option<i64>,

        #[arg(long)]
        phase: Option<i64>,

        /// Story points (ignored for waterfall projects)
        #[arg(long)]
        points: Option<u32>,

        /// Planned length in days
        #[arg(long)]
        duration: Option<i64>,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long)]
        milestone: bool,

        /// Parent item number in the WBS
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Show a work item
    Show {
        #[arg(short, long)]
        project: i64,

        number: i64,
    },

    /// List work items in WBS order
    List {
        #[arg(short, long)]
        project: i64,

        /// Include archived items
        #[arg(short, long)]
        all: bool,
    },

    /// Update editable fields
    Update {
        #[arg(short, long)]
        project: i64,

        number: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(long)]
        points: Option<u32>,

        #[arg(long)]
        duration: Option<i64>,

        #[arg(long)]
        business_value: Option<u32>,

        #[arg(long)]
        time_criticality: Option<u32>,

        #[arg(long)]
        risk_reduction: Option<u32>,

        #[arg(long)]
        job_size: Option<u32>,
    },

    /// Move an item to a column position (WIP and Definition of Done gated)
    Move {
        #[arg(short, long)]
        project: i64,

        number: i64,

        /// Target column id
        #[arg(long)]
        column: i64,

        /// Zero-based position in the target column (defaults to the bottom)
        #[arg(long)]
        position: Option<i64>,
    },

    /// Archive (soft-delete) an item
    Archive {
        #[arg(short, long)]
        project: i64,

        number: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChecklistCommands {
    /// Add a checklist entry to an item
    Add {
        #[arg(short, long)]
        project: i64,

        item: i64,

        label: String,

        /// dod or dor
        #[arg(short, long, default_value = "dod")]
        kind: ChecklistKind,
    },

    /// Check (or uncheck) an entry
    Check {
        #[arg(short, long)]
        project: i64,

        id: i64,

        #[arg(long)]
        uncheck: bool,
    },

    /// List an item's checklist
    List {
        #[arg(short, long)]
        project: i64,

        item: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum SprintCommands {
    /// Create a sprint in PLANNING
    Create {
        #[arg(short, long)]
        project: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        goal: Option<String>,

        /// Owning phase (hybrid projects)
        #[arg(long)]
        phase: Option<i64>,
    },

    /// Start a sprint
    Start {
        #[arg(short, long)]
        project: i64,

        id: i64,

        /// Defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Defaults to start plus the configured sprint length
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Close the active sprint
    Close {
        #[arg(short, long)]
        project: i64,

        id: i64,
    },

    /// Record today's burndown snapshot
    Snapshot {
        #[arg(short, long)]
        project: i64,

        id: i64,
    },

    /// Move unfinished items of a closed sprint
    Rollover {
        #[arg(short, long)]
        project: i64,

        id: i64,

        /// Item numbers to carry into the next sprint
        #[arg(long, value_delimiter = ',')]
        next: Vec<i64>,

        /// Item numbers to return to the backlog
        #[arg(long, value_delimiter = ',')]
        backlog: Vec<i64>,
    },

    /// Show burndown snapshots with the ideal line
    Burndown {
        #[arg(short, long)]
        project: i64,

        id: i64,
    },

    /// List sprints
    List {
        #[arg(short, long)]
        project: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum PhaseCommands {
    /// Create a phase
    Add {
        #[arg(short, long)]
        project: i64,

        name: String,

        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        /// Mark as a milestone gate
        #[arg(long)]
        gate: bool,

        #[arg(long)]
        color: Option<String>,
    },

    /// Update a phase
    Update {
        #[arg(short, long)]
        project: i64,

        id: i64,

        #[arg(long)]
        name: Option<String>,

        /// Completion percentage (0-100)
        #[arg(long)]
        progress: Option<u8>,

        #[arg(long)]
        color: Option<String>,
    },

    /// List phases
    List {
        #[arg(short, long)]
        project: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Add a dependency `predecessor -> successor`
    Add {
        #[arg(short, long)]
        project: i64,

        predecessor: i64,

        successor: i64,

        /// phase or item
        #[arg(short, long, default_value = "phase")]
        kind: NodeKind,

        /// FS, SS, FF, or SF
        #[arg(short = 't', long = "type", default_value = "FS")]
        dep_type: DependencyType,

        /// Offset in days (may be negative)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        lag: i64,
    },

    /// Remove a dependency
    Remove {
        #[arg(short, long)]
        project: i64,

        predecessor: i64,

        successor: i64,

        #[arg(short, long, default_value = "phase")]
        kind: NodeKind,
    },

    /// List dependencies
    List {
        #[arg(short, long)]
        project: i64,

        #[arg(short, long, default_value = "phase")]
        kind: NodeKind,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    /// Recompute dates forward along dependencies
    Recalc {
        #[arg(short, long)]
        project: i64,
    },

    /// Capture current dates as the baseline
    Baseline {
        #[arg(short, long)]
        project: i64,
    },

    /// Show slip against the baseline
    Variance {
        #[arg(short, long)]
        project: i64,
    },

    /// Set a node's dates by hand
    SetDates {
        #[arg(short, long)]
        project: i64,

        id: i64,

        #[arg(short, long, default_value = "phase")]
        kind: NodeKind,

        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WbsCommands {
    /// Show the outline
    Show {
        #[arg(short, long)]
        project: i64,
    },

    /// Nest an item under its preceding sibling
    Indent {
        #[arg(short, long)]
        project: i64,

        number: i64,
    },

    /// Move an item up one level
    Outdent {
        #[arg(short, long)]
        project: i64,

        number: i64,
    },

    /// Move an item (and its subtree) under a new parent
    Reparent {
        #[arg(short, long)]
        project: i64,

        number: i64,

        /// New parent; omit to make it a root
        #[arg(long)]
        parent: Option<i64>,
    },
}
