//! Phase, dependency, and schedulable-node rows.
//!
//! Phases and work items are both scheduled through [`ScheduleNode`], a
//! uniform view of "something with a start, an end, and a baseline". The
//! [`NodeKind`] picks the backing table.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::models::graph::{DependencyGraph, GraphEdge};
use crate::models::{Dependency, NodeKind, Phase};
use crate::{Error, Result};

/// Fields accepted when creating a phase.
#[derive(Debug, Clone)]
pub struct NewPhase {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_gate: bool,
    pub color: Option<String>,
}

impl NewPhase {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
            is_gate: false,
            color: None,
        }
    }
}

/// A phase or work item as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleNode {
    pub kind: NodeKind,
    /// Phase id or work item number
    pub id: i64,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub baseline_start_date: Option<NaiveDate>,
    pub baseline_end_date: Option<NaiveDate>,
    /// Planned length in days (work items only)
    pub duration: Option<i64>,
}

impl ScheduleNode {
    /// Length in days: the date range when both ends are known, else the duration.
    pub fn span(&self) -> Option<i64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((end - start).num_days()),
            _ => self.duration,
        }
    }

    /// Human label, e.g. `phase 3 (Design)` or `#7 (Login)`.
    pub fn label(&self) -> String {
        match self.kind {
            NodeKind::Phase => format!("phase {} ({})", self.id, self.name),
            NodeKind::WorkItem => format!("#{} ({})", self.id, self.name),
        }
    }
}

fn phase_from_row(row: &Row<'_>) -> rusqlite::Result<Phase> {
    Ok(Phase {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        baseline_start_date: row.get("baseline_start_date")?,
        baseline_end_date: row.get("baseline_end_date")?,
        progress: row.get("progress")?,
        is_gate: row.get("is_gate")?,
        color: row.get("color")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
    })
}

fn dependency_from_row(row: &Row<'_>) -> rusqlite::Result<Dependency> {
    Ok(Dependency {
        project_id: row.get("project_id")?,
        kind: row.get("kind")?,
        predecessor: row.get("predecessor")?,
        successor: row.get("successor")?,
        dep_type: row.get("dep_type")?,
        lag: row.get("lag")?,
        created_at: row.get("created_at")?,
    })
}

const PHASE_COLUMNS: &str = "id, project_id, name, start_date, end_date, baseline_start_date, \
     baseline_end_date, progress, is_gate, color, position, created_at";

// === Phases ===

pub fn insert_phase(conn: &Connection, project_id: i64, new: NewPhase) -> Result<Phase> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Phase name cannot be empty".to_string()));
    }
    if new.end_date < new.start_date {
        return Err(Error::InvalidInput(format!(
            "Phase end {} is before its start {}",
            new.end_date, new.start_date
        )));
    }

    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM phases WHERE project_id = ?1",
        [project_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO phases
            (project_id, name, start_date, end_date, is_gate, color, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            project_id,
            name,
            new.start_date,
            new.end_date,
            new.is_gate,
            new.color,
            position,
            Utc::now()
        ],
    )?;
    get_phase(conn, project_id, conn.last_insert_rowid())
}

pub fn get_phase(conn: &Connection, project_id: i64, id: i64) -> Result<Phase> {
    conn.query_row(
        &format!(
            "SELECT {} FROM phases WHERE project_id = ?1 AND id = ?2",
            PHASE_COLUMNS
        ),
        params![project_id, id],
        phase_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Phase {} not found", id)))
}

pub fn list_phases(conn: &Connection, project_id: i64) -> Result<Vec<Phase>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM phases WHERE project_id = ?1 ORDER BY position, id",
        PHASE_COLUMNS
    ))?;
    let phases = stmt
        .query_map([project_id], phase_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(phases)
}

pub fn update_phase(conn: &Connection, phase: &Phase) -> Result<Phase> {
    get_phase(conn, phase.project_id, phase.id)?;
    if phase.name.trim().is_empty() {
        return Err(Error::InvalidInput("Phase name cannot be empty".to_string()));
    }
    if phase.progress > 100 {
        return Err(Error::InvalidInput(format!(
            "Progress must be between 0 and 100, got {}",
            phase.progress
        )));
    }
    if phase.end_date < phase.start_date {
        return Err(Error::InvalidInput(format!(
            "Phase end {} is before its start {}",
            phase.end_date, phase.start_date
        )));
    }

    conn.execute(
        "UPDATE phases SET name = ?1, start_date = ?2, end_date = ?3, progress = ?4,
            is_gate = ?5, color = ?6
         WHERE project_id = ?7 AND id = ?8",
        params![
            phase.name.trim(),
            phase.start_date,
            phase.end_date,
            phase.progress,
            phase.is_gate,
            phase.color,
            phase.project_id,
            phase.id
        ],
    )?;
    get_phase(conn, phase.project_id, phase.id)
}

// === Schedulable nodes ===

fn node_from_phase(phase: Phase) -> ScheduleNode {
    ScheduleNode {
        kind: NodeKind::Phase,
        id: phase.id,
        name: phase.name,
        start_date: Some(phase.start_date),
        end_date: Some(phase.end_date),
        baseline_start_date: phase.baseline_start_date,
        baseline_end_date: phase.baseline_end_date,
        duration: None,
    }
}

fn node_from_item_row(row: &Row<'_>) -> rusqlite::Result<ScheduleNode> {
    Ok(ScheduleNode {
        kind: NodeKind::WorkItem,
        id: row.get("number")?,
        name: row.get("title")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        baseline_start_date: row.get("baseline_start_date")?,
        baseline_end_date: row.get("baseline_end_date")?,
        duration: row.get("duration")?,
    })
}

/// Load every schedulable node of one kind (archived work items excluded).
pub fn load_nodes(conn: &Connection, project_id: i64, kind: NodeKind) -> Result<Vec<ScheduleNode>> {
    match kind {
        NodeKind::Phase => Ok(list_phases(conn, project_id)?
            .into_iter()
            .map(node_from_phase)
            .collect()),
        NodeKind::WorkItem => {
            let mut stmt = conn.prepare(
                "SELECT number, title, start_date, end_date, baseline_start_date,
                    baseline_end_date, duration
                 FROM work_items WHERE project_id = ?1 AND archived_at IS NULL
                 ORDER BY outline_position, number",
            )?;
            let nodes = stmt
                .query_map([project_id], node_from_item_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(nodes)
        }
    }
}

pub fn get_node(
    conn: &Connection,
    project_id: i64,
    kind: NodeKind,
    id: i64,
) -> Result<ScheduleNode> {
    match kind {
        NodeKind::Phase => Ok(node_from_phase(get_phase(conn, project_id, id)?)),
        NodeKind::WorkItem => conn
            .query_row(
                "SELECT number, title, start_date, end_date, baseline_start_date,
                    baseline_end_date, duration
                 FROM work_items WHERE project_id = ?1 AND number = ?2 AND archived_at IS NULL",
                params![project_id, id],
                node_from_item_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Work item #{} not found", id))),
    }
}

/// Overwrite a node's planned dates. A work item's duration follows a full range.
pub fn write_node_dates(
    conn: &Connection,
    project_id: i64,
    kind: NodeKind,
    id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    match kind {
        NodeKind::Phase => {
            let (Some(start), Some(end)) = (start, end) else {
                return Err(Error::InvalidInput(
                    "Phases require both a start and an end date".to_string(),
                ));
            };
            conn.execute(
                "UPDATE phases SET start_date = ?1, end_date = ?2
                 WHERE project_id = ?3 AND id = ?4",
                params![start, end, project_id, id],
            )?;
        }
        NodeKind::WorkItem => {
            let span = start.zip(end).map(|(start, end)| (end - start).num_days());
            conn.execute(
                "UPDATE work_items SET start_date = ?1, end_date = ?2,
                    duration = COALESCE(?3, duration), updated_at = ?4
                 WHERE project_id = ?5 AND number = ?6",
                params![start, end, span, Utc::now(), project_id, id],
            )?;
        }
    }
    Ok(())
}

/// Copy current dates into the baseline columns. Returns the number of nodes baselined.
pub fn write_baseline(conn: &Connection, project_id: i64, kind: NodeKind) -> Result<usize> {
    let count = match kind {
        NodeKind::Phase => conn.execute(
            "UPDATE phases SET baseline_start_date = start_date, baseline_end_date = end_date
             WHERE project_id = ?1",
            [project_id],
        )?,
        NodeKind::WorkItem => conn.execute(
            "UPDATE work_items SET baseline_start_date = start_date, baseline_end_date = end_date
             WHERE project_id = ?1 AND archived_at IS NULL",
            [project_id],
        )?,
    };
    Ok(count)
}

// === Dependencies ===

pub fn insert_dependency(
    conn: &Connection,
    project_id: i64,
    kind: NodeKind,
    edge: GraphEdge,
) -> Result<Dependency> {
    conn.execute(
        "INSERT INTO dependencies
            (project_id, kind, predecessor, successor, dep_type, lag, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            project_id,
            kind,
            edge.predecessor,
            edge.successor,
            edge.dep_type,
            edge.lag,
            Utc::now()
        ],
    )?;
    get_dependency(conn, project_id, kind, edge.predecessor, edge.successor)?.ok_or_else(|| {
        Error::Other(format!(
            "Dependency {} -> {} vanished after insert",
            edge.predecessor, edge.successor
        ))
    })
}

pub fn get_dependency(
    conn: &Connection,
    project_id: i64,
    kind: NodeKind,
    predecessor: i64,
    successor: i64,
) -> Result<Option<Dependency>> {
    let dependency = conn
        .query_row(
            "SELECT project_id, kind, predecessor, successor, dep_type, lag, created_at
             FROM dependencies
             WHERE project_id = ?1 AND kind = ?2 AND predecessor = ?3 AND successor = ?4",
            params![project_id, kind, predecessor, successor],
            dependency_from_row,
        )
        .optional()?;
    Ok(dependency)
}

/// Delete an edge. Returns whether it existed.
pub fn delete_dependency(
    conn: &Connection,
    project_id: i64,
    kind: NodeKind,
    predecessor: i64,
    successor: i64,
) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM dependencies
         WHERE project_id = ?1 AND kind = ?2 AND predecessor = ?3 AND successor = ?4",
        params![project_id, kind, predecessor, successor],
    )?;
    Ok(deleted > 0)
}

pub fn list_dependencies(
    conn: &Connection,
    project_id: i64,
    kind: NodeKind,
) -> Result<Vec<Dependency>> {
    let mut stmt = conn.prepare(
        "SELECT project_id, kind, predecessor, successor, dep_type, lag, created_at
         FROM dependencies WHERE project_id = ?1 AND kind = ?2
         ORDER BY predecessor, successor",
    )?;
    let deps = stmt
        .query_map(params![project_id, kind], dependency_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(deps)
}

/// Build the precedence graph for one node kind from committed rows.
///
/// Edges whose endpoints are no longer schedulable (archived items) are dropped.
pub fn load_graph(conn: &Connection, project_id: i64, kind: NodeKind) -> Result<DependencyGraph> {
    let nodes: Vec<i64> = load_nodes(conn, project_id, kind)?
        .iter()
        .map(|n| n.id)
        .collect();
    let edges = list_dependencies(conn, project_id, kind)?
        .into_iter()
        .filter(|d| nodes.contains(&d.predecessor) && nodes.contains(&d.successor))
        .map(|d| GraphEdge {
            predecessor: d.predecessor,
            successor: d.successor,
            dep_type: d.dep_type,
            lag: d.lag,
        });
    Ok(DependencyGraph::from_parts(nodes.iter().copied(), edges))
}
