//! Storage layer for Helmsman data.
//!
//! All state lives in a single SQLite database (`helmsman.db`) under
//! `<data-dir>/helmsman/<workspace-hash>/`. Row-level helpers in the
//! submodules take a plain `&Connection`, so the engine can run them inside
//! one immediate transaction and callers outside the engine can use them
//! directly.
//!
//! ## Transactions
//!
//! Every mutating engine operation goes through [`Storage::immediate`], which
//! opens a `BEGIN IMMEDIATE` transaction. SQLite grants the database write
//! lock at that point, so two connections evaluating the same WIP limit or
//! the same "one active sprint" rule are serialized and each re-reads the
//! committed state.

pub mod items;
pub mod projects;
pub mod schedule;
pub mod sprints;

pub use items::NewWorkItem;
pub use schedule::{NewPhase, ScheduleNode};

use crate::models::{
    Activity, BoardColumn, ChecklistItem, ChecklistKind, ColumnType, Dependency, DependencyType,
    Methodology, NodeKind, Phase, Project, Sprint, SprintSnapshot, SprintStatus, WorkItem,
};
use crate::{Error, Result};
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "HM_DATA_DIR";

/// Database file name inside the storage root.
const DB_FILE: &str = "helmsman.db";

/// Current schema version recorded in the meta table.
const SCHEMA_VERSION: &str = "1";

/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Storage manager for a single workspace.
pub struct Storage {
    /// Root directory for this workspace's data
    pub root: PathBuf,
    conn: Connection,
}

impl Storage {
    /// Open existing storage for the given workspace path.
    pub fn open(workspace: &Path) -> Result<Self> {
        Self::open_root(get_storage_dir(workspace)?)
    }

    /// Initialize storage for a new workspace.
    pub fn init(workspace: &Path) -> Result<Self> {
        Self::init_root(get_storage_dir(workspace)?)
    }

    /// Check if storage exists for the given workspace.
    pub fn exists(workspace: &Path) -> Result<bool> {
        let root = get_storage_dir(workspace)?;
        Ok(root.join(DB_FILE).exists())
    }

    /// Open existing storage with an explicit data directory.
    pub fn open_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        Self::open_root(storage_dir_in(workspace, data_dir)?)
    }

    /// Initialize storage with an explicit data directory.
    pub fn init_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<Self> {
        Self::init_root(storage_dir_in(workspace, data_dir)?)
    }

    /// Check for storage with an explicit data directory.
    pub fn exists_with_data_dir(workspace: &Path, data_dir: &Path) -> Result<bool> {
        Ok(storage_dir_in(workspace, data_dir)?.join(DB_FILE).exists())
    }

    fn open_root(root: PathBuf) -> Result<Self> {
        let db_path = root.join(DB_FILE);
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }
        Self::connect(root)
    }

    fn init_root(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Self::connect(root)
    }

    fn connect(root: PathBuf) -> Result<Self> {
        let conn = Connection::open(root.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;
        Ok(Self { root, conn })
    }

    /// Override the SQLite busy timeout.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                methodology TEXT NOT NULL,
                done_status TEXT NOT NULL DEFAULT 'Done',
                default_start TEXT,
                sprint_count INTEGER NOT NULL DEFAULT 0,
                item_seq INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS board_columns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                col_type TEXT NOT NULL,
                board_type TEXT NOT NULL DEFAULT 'kanban',
                wip_limit INTEGER CHECK (wip_limit IS NULL OR wip_limit > 0),
                position INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_columns_project ON board_columns(project_id, position);

            CREATE TABLE IF NOT EXISTS work_items (
                project_id INTEGER NOT NULL,
                number INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL,
                column_id INTEGER,
                position INTEGER NOT NULL DEFAULT 0,
                sprint_id INTEGER,
                phase_id INTEGER,
                story_points INTEGER,
                business_value INTEGER NOT NULL DEFAULT 0,
                time_criticality INTEGER NOT NULL DEFAULT 0,
                risk_reduction INTEGER NOT NULL DEFAULT 0,
                job_size INTEGER NOT NULL DEFAULT 0,
                duration INTEGER,
                start_date TEXT,
                end_date TEXT,
                baseline_start_date TEXT,
                baseline_end_date TEXT,
                is_milestone INTEGER NOT NULL DEFAULT 0,
                parent_number INTEGER,
                outline_level INTEGER NOT NULL DEFAULT 1 CHECK (outline_level >= 1),
                outline_position INTEGER NOT NULL DEFAULT 0,
                wbs_index TEXT NOT NULL DEFAULT '',
                archived_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (project_id, number),
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_work_items_column ON work_items(project_id, column_id);
            CREATE INDEX IF NOT EXISTS idx_work_items_sprint ON work_items(project_id, sprint_id);

            CREATE TABLE IF NOT EXISTS checklist_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                work_item INTEGER NOT NULL,
                kind TEXT NOT NULL,
                label TEXT NOT NULL,
                checked INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (project_id, work_item) REFERENCES work_items(project_id, number)
            );

            CREATE INDEX IF NOT EXISTS idx_checklist_item ON checklist_items(project_id, work_item);

            CREATE TABLE IF NOT EXISTS phases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                baseline_start_date TEXT,
                baseline_end_date TEXT,
                progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
                is_gate INTEGER NOT NULL DEFAULT 0,
                color TEXT,
                position INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS dependencies (
                project_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                predecessor INTEGER NOT NULL,
                successor INTEGER NOT NULL,
                dep_type TEXT NOT NULL DEFAULT 'FS',
                lag INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (project_id, kind, predecessor, successor),
                CHECK (predecessor <> successor)
            );

            CREATE INDEX IF NOT EXISTS idx_dependencies_successor
                ON dependencies(project_id, kind, successor);

            CREATE TABLE IF NOT EXISTS sprints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                goal TEXT,
                phase_id INTEGER,
                status TEXT NOT NULL DEFAULT 'PLANNING',
                start_date TEXT,
                end_date TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                closed_at TEXT,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            -- Store-level backstop for the one-active-sprint rule
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sprints_one_active
                ON sprints(project_id) WHERE status = 'ACTIVE';

            CREATE TABLE IF NOT EXISTS sprint_snapshots (
                sprint_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                total_points INTEGER NOT NULL,
                completed_points INTEGER NOT NULL,
                PRIMARY KEY (sprint_id, date),
                FOREIGN KEY (sprint_id) REFERENCES sprints(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                work_item INTEGER NOT NULL,
                action TEXT NOT NULL,
                from_value TEXT,
                to_value TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activities_item ON activities(project_id, work_item);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            [SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls the whole unit back.
    pub fn immediate<T>(&mut self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Read-only access to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get the storage root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // === Projects & Columns ===

    /// Create a project.
    pub fn create_project(
        &mut self,
        name: &str,
        methodology: Methodology,
        done_status: Option<&str>,
        default_start: Option<NaiveDate>,
    ) -> Result<Project> {
        self.immediate(|tx| {
            projects::insert_project(tx, name, methodology, done_status, default_start)
        })
    }

    pub fn get_project(&self, id: i64) -> Result<Project> {
        projects::get_project(&self.conn, id)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        projects::list_projects(&self.conn)
    }

    /// Append a column at the end of the project's board.
    pub fn create_column(
        &mut self,
        project_id: i64,
        name: &str,
        col_type: ColumnType,
        board_type: &str,
        wip_limit: Option<u32>,
    ) -> Result<BoardColumn> {
        self.immediate(|tx| {
            projects::get_project(tx, project_id)?;
            projects::insert_column(tx, project_id, name, col_type, board_type, wip_limit)
        })
    }

    pub fn get_column(&self, project_id: i64, id: i64) -> Result<BoardColumn> {
        projects::get_column(&self.conn, project_id, id)
    }

    pub fn list_columns(
        &self,
        project_id: i64,
        board_type: Option<&str>,
    ) -> Result<Vec<BoardColumn>> {
        projects::list_columns(&self.conn, project_id, board_type)
    }

    /// Change (or clear) a column's WIP limit.
    pub fn set_wip_limit(
        &mut self,
        project_id: i64,
        column_id: i64,
        wip_limit: Option<u32>,
    ) -> Result<BoardColumn> {
        if wip_limit == Some(0) {
            return Err(Error::InvalidInput("WIP limit must be a positive integer".to_string()));
        }
        self.immediate(|tx| {
            projects::get_column(tx, project_id, column_id)?;
            tx.execute(
                "UPDATE board_columns SET wip_limit = ?1 WHERE project_id = ?2 AND id = ?3",
                params![wip_limit, project_id, column_id],
            )?;
            projects::get_column(tx, project_id, column_id)
        })
    }

    /// Delete a column. Rejected while it still holds non-archived work items.
    pub fn delete_column(&mut self, project_id: i64, column_id: i64) -> Result<()> {
        self.immediate(|tx| {
            let column = projects::get_column(tx, project_id, column_id)?;
            let occupied = items::count_in_column(tx, project_id, column_id)?;
            if occupied > 0 {
                return Err(Error::Conflict(format!(
                    "Column '{}' still contains {} work item(s)",
                    column.name, occupied
                )));
            }
            tx.execute(
                "DELETE FROM board_columns WHERE project_id = ?1 AND id = ?2",
                params![project_id, column_id],
            )?;
            Ok(())
        })
    }

    // === Work Items ===

    /// Create a work item with the next per-project number.
    pub fn create_work_item(&mut self, project_id: i64, new: NewWorkItem) -> Result<WorkItem> {
        self.immediate(|tx| items::insert_work_item(tx, project_id, new))
    }

    pub fn get_work_item(&self, project_id: i64, number: i64) -> Result<WorkItem> {
        items::get_work_item(&self.conn, project_id, number)
    }

    pub fn list_work_items(
        &self,
        project_id: i64,
        include_archived: bool,
    ) -> Result<Vec<WorkItem>> {
        items::list_work_items(&self.conn, project_id, include_archived)
    }

    /// Persist the editable fields of a work item.
    ///
    /// Board placement and outline fields are engine-managed and ignored.
    pub fn update_work_item(&mut self, item: &WorkItem) -> Result<WorkItem> {
        self.immediate(|tx| items::update_work_item(tx, item))
    }

    /// Soft-delete a work item.
    pub fn archive_work_item(&mut self, project_id: i64, number: i64) -> Result<WorkItem> {
        self.immediate(|tx| items::archive_work_item(tx, project_id, number))
    }

    // === Checklists ===

    pub fn add_checklist_item(
        &mut self,
        project_id: i64,
        work_item: i64,
        kind: ChecklistKind,
        label: &str,
    ) -> Result<ChecklistItem> {
        self.immediate(|tx| items::insert_checklist_item(tx, project_id, work_item, kind, label))
    }

    pub fn set_checklist_checked(
        &mut self,
        project_id: i64,
        id: i64,
        checked: bool,
    ) -> Result<ChecklistItem> {
        self.immediate(|tx| items::set_checklist_checked(tx, project_id, id, checked))
    }

    pub fn list_checklist(&self, project_id: i64, work_item: i64) -> Result<Vec<ChecklistItem>> {
        items::list_checklist(&self.conn, project_id, work_item)
    }

    pub fn list_activity(&self, project_id: i64, work_item: Option<i64>) -> Result<Vec<Activity>> {
        items::list_activity(&self.conn, project_id, work_item)
    }

    // === Phases & Dependencies ===

    pub fn create_phase(&mut self, project_id: i64, new: NewPhase) -> Result<Phase> {
        self.immediate(|tx| {
            projects::get_project(tx, project_id)?;
            schedule::insert_phase(tx, project_id, new)
        })
    }

    pub fn get_phase(&self, project_id: i64, id: i64) -> Result<Phase> {
        schedule::get_phase(&self.conn, project_id, id)
    }

    pub fn list_phases(&self, project_id: i64) -> Result<Vec<Phase>> {
        schedule::list_phases(&self.conn, project_id)
    }

    /// Persist a phase's editable fields (name, dates, progress, gate flag, color).
    pub fn update_phase(&mut self, phase: &Phase) -> Result<Phase> {
        self.immediate(|tx| schedule::update_phase(tx, phase))
    }

    pub fn list_dependencies(&self, project_id: i64, kind: NodeKind) -> Result<Vec<Dependency>> {
        schedule::list_dependencies(&self.conn, project_id, kind)
    }

    // === Sprints ===

    pub fn get_sprint(&self, project_id: i64, id: i64) -> Result<Sprint> {
        sprints::get_sprint(&self.conn, project_id, id)
    }

    pub fn list_sprints(&self, project_id: i64) -> Result<Vec<Sprint>> {
        sprints::list_sprints(&self.conn, project_id)
    }

    pub fn list_snapshots(&self, sprint_id: i64) -> Result<Vec<SprintSnapshot>> {
        sprints::list_snapshots(&self.conn, sprint_id)
    }

    /// Schema version the database was created with.
    pub fn schema_version(&self) -> Result<String> {
        let version: String = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }
}

/// Get the storage directory for a workspace.
///
/// Uses `HM_DATA_DIR` when set, otherwise the platform data directory,
/// then a hash of the canonical workspace path.
pub fn get_storage_dir(workspace: &Path) -> Result<PathBuf> {
    let data_dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?
            .join("helmsman"),
    };
    storage_dir_in(workspace, &data_dir)
}

fn storage_dir_in(workspace: &Path, data_dir: &Path) -> Result<PathBuf> {
    let canonical = workspace
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize workspace path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(data_dir.join(&hash_hex[..12]))
}

/// Store an enum by its canonical string form.
macro_rules! sql_text_enum {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: String| FromSqlError::Other(e.into()))
                }
            }
        )*
    };
}

sql_text_enum!(
    Methodology,
    ColumnType,
    ChecklistKind,
    NodeKind,
    DependencyType,
    SprintStatus,
);
