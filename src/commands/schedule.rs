//! Dependency edits, forward auto-scheduling, and baselines.
//!
//! Phases and work items form two independent precedence graphs. Both are
//! rebuilt from committed rows inside the transaction that edits or
//! propagates them.

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use super::{Output, json};
use crate::models::graph::GraphEdge;
use crate::models::{
    Dependency, DependencyType, MAX_OFFSET_DAYS, NodeKind, ScheduleWarning, shift_date,
};
use crate::storage::{ScheduleNode, Storage, items, projects, schedule};
use crate::{Error, Result};

/// Earliest start `successor` may take under one edge.
///
/// Finish-based constraints (FF, SF) pin the successor's end, so they are
/// turned into a start by subtracting its span. Returns `Ok(None)` when the
/// predecessor lacks the date the constraint refers to, and an error when
/// the shifted date falls outside the calendar.
pub fn earliest_start(
    edge: &GraphEdge,
    predecessor: &ScheduleNode,
    successor: &ScheduleNode,
) -> Result<Option<NaiveDate>> {
    let span = successor.span().unwrap_or(0);
    let (anchor, offset) = match edge.dep_type {
        DependencyType::FinishToStart => (predecessor.end_date, Some(edge.lag)),
        DependencyType::StartToStart => (predecessor.start_date, Some(edge.lag)),
        DependencyType::FinishToFinish => (predecessor.end_date, edge.lag.checked_sub(span)),
        DependencyType::StartToFinish => (predecessor.start_date, edge.lag.checked_sub(span)),
    };
    let Some(anchor) = anchor else {
        return Ok(None);
    };
    offset
        .and_then(|days| shift_date(anchor, days))
        .map(Some)
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "Dependency {} -> {} pushes {} outside the supported date range",
                edge.predecessor,
                edge.successor,
                successor.label()
            ))
        })
}

/// A new edge plus the advisory findings it produced.
#[derive(Debug, Serialize)]
pub struct DependencyAdded {
    pub dependency: Dependency,
    pub warnings: Vec<ScheduleWarning>,
}

impl Output for DependencyAdded {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let d = &self.dependency;
        let mut lines = vec![format!(
            "Added {} dependency {} -> {} (lag {})",
            d.dep_type, d.predecessor, d.successor, d.lag
        )];
        lines.extend(self.warnings.iter().map(|w| format!("  warning: {}", w)));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct DependencyRemoved {
    pub predecessor: i64,
    pub successor: i64,
    /// False when there was no such edge
    pub removed: bool,
}

impl Output for DependencyRemoved {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.removed {
            format!("Removed dependency {} -> {}", self.predecessor, self.successor)
        } else {
            format!("No dependency {} -> {}", self.predecessor, self.successor)
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalcResult {
    pub updated: usize,
    pub phases_updated: usize,
    pub tasks_updated: usize,
    pub warnings: Vec<ScheduleWarning>,
}

impl Output for RecalcResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Rescheduled {} node(s): {} phase(s), {} task(s)",
            self.updated, self.phases_updated, self.tasks_updated
        )];
        lines.extend(self.warnings.iter().map(|w| format!("  warning: {}", w)));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct BaselineResult {
    pub baselined: usize,
    pub phases: usize,
    pub tasks: usize,
}

impl Output for BaselineResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Baseline saved for {} node(s) ({} phase(s), {} task(s))",
            self.baselined, self.phases, self.tasks
        )
    }
}

/// Slip of one node against its baseline, in days (positive = late).
#[derive(Debug, Serialize)]
pub struct Variance {
    pub kind: NodeKind,
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_slip_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_slip_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VarianceReport {
    pub nodes: Vec<Variance>,
}

impl Output for VarianceReport {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.nodes.is_empty() {
            return "No baseline captured".to_string();
        }
        let slip = |days: Option<i64>| days.map(|d| format!("{:+}d", d)).unwrap_or("-".into());
        self.nodes
            .iter()
            .map(|v| {
                format!(
                    "{} {} {}: start {}, end {}",
                    v.kind,
                    v.id,
                    v.name,
                    slip(v.start_slip_days),
                    slip(v.end_slip_days)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Output for ScheduleNode {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let show = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or("?".into());
        format!(
            "{}: {} .. {}",
            self.label(),
            show(self.start_date),
            show(self.end_date)
        )
    }
}

/// Findings for a freshly inserted edge against the successor's current dates.
fn edge_warnings(
    edge: &GraphEdge,
    predecessor: &ScheduleNode,
    successor: &ScheduleNode,
) -> Result<Vec<ScheduleWarning>> {
    let Some(required) = earliest_start(edge, predecessor, successor)? else {
        return Ok(vec![ScheduleWarning::UndatedPredecessor {
            node: successor.id,
            predecessor: predecessor.id,
        }]);
    };
    let warnings = match successor.start_date {
        Some(current) if current < required => vec![ScheduleWarning::ConstraintViolated {
            node: successor.id,
            current_start: current,
            required_start: required,
        }],
        Some(current) if current > required => vec![ScheduleWarning::SlackBeforeStart {
            node: successor.id,
            current_start: current,
            earliest_start: required,
            slack_days: (current - required).num_days(),
        }],
        _ => Vec::new(),
    };
    Ok(warnings)
}

/// Insert a precedence edge `predecessor -> successor`.
///
/// Rejects self-loops and edges that would close a cycle (checked against
/// the edges committed at the time the write lock is held) and duplicates.
/// Date conflicts are reported as warnings and never block the edit. The lag
/// is limited to [`MAX_OFFSET_DAYS`] in either direction.
pub fn add_dependency(
    storage: &mut Storage,
    project_id: i64,
    kind: NodeKind,
    predecessor: i64,
    successor: i64,
    dep_type: DependencyType,
    lag: i64,
) -> Result<DependencyAdded> {
    if !(-MAX_OFFSET_DAYS..=MAX_OFFSET_DAYS).contains(&lag) {
        return Err(Error::InvalidInput(format!(
            "Lag must be between -{} and {} days",
            MAX_OFFSET_DAYS, MAX_OFFSET_DAYS
        )));
    }

    storage.immediate(|tx| {
        projects::get_project(tx, project_id)?;
        let pred = schedule::get_node(tx, project_id, kind, predecessor)?;
        let succ = schedule::get_node(tx, project_id, kind, successor)?;

        let graph = schedule::load_graph(tx, project_id, kind)?;
        if graph.would_create_cycle(predecessor, successor) {
            tracing::warn!(project_id, %kind, predecessor, successor, "dependency rejected: cycle");
            return Err(Error::CycleDetected {
                predecessor,
                successor,
            });
        }
        if graph.contains_edge(predecessor, successor) {
            return Err(Error::Conflict(format!(
                "Dependency {} -> {} already exists",
                predecessor, successor
            )));
        }

        let edge = GraphEdge {
            predecessor,
            successor,
            dep_type,
            lag,
        };
        let warnings = edge_warnings(&edge, &pred, &succ)?;
        let dependency = schedule::insert_dependency(tx, project_id, kind, edge)?;
        tracing::info!(
            project_id,
            %kind,
            predecessor,
            successor,
            %dep_type,
            lag,
            warnings = warnings.len(),
            "dependency added"
        );
        Ok(DependencyAdded {
            dependency,
            warnings,
        })
    })
}

/// Delete an edge. Dates shifted by it earlier stay where they are.
pub fn remove_dependency(
    storage: &mut Storage,
    project_id: i64,
    kind: NodeKind,
    predecessor: i64,
    successor: i64,
) -> Result<DependencyRemoved> {
    storage.immediate(|tx| {
        projects::get_project(tx, project_id)?;
        let removed = schedule::delete_dependency(tx, project_id, kind, predecessor, successor)?;
        tracing::info!(project_id, %kind, predecessor, successor, removed, "dependency removed");
        Ok(DependencyRemoved {
            predecessor,
            successor,
            removed,
        })
    })
}

/// Forward-propagate one graph. Returns the number of nodes rewritten.
fn propagate(
    conn: &Connection,
    project_id: i64,
    kind: NodeKind,
    anchor: Option<NaiveDate>,
    warnings: &mut Vec<ScheduleWarning>,
) -> Result<usize> {
    let graph = schedule::load_graph(conn, project_id, kind)?;
    let order = graph.topological_order().ok_or_else(|| {
        Error::Other(format!(
            "Stored {} dependencies contain a cycle; remove one edge and retry",
            kind
        ))
    })?;
    let mut nodes: HashMap<i64, ScheduleNode> = schedule::load_nodes(conn, project_id, kind)?
        .into_iter()
        .map(|n| (n.id, n))
        .collect();

    let mut updated = 0;
    for id in order {
        let Some(node) = nodes.get(&id) else {
            continue;
        };
        let span = node.span().unwrap_or(0);

        let candidate = if graph.predecessors(id).is_empty() {
            match (node.start_date, anchor) {
                (None, Some(anchor)) => Some(anchor),
                _ => None,
            }
        } else {
            let mut best: Option<NaiveDate> = None;
            for edge in graph.predecessors(id) {
                let Some(pred) = nodes.get(&edge.predecessor) else {
                    continue;
                };
                match earliest_start(edge, pred, node)? {
                    Some(start) => best = best.max(Some(start)),
                    None => warnings.push(ScheduleWarning::UndatedPredecessor {
                        node: id,
                        predecessor: edge.predecessor,
                    }),
                }
            }
            best
        };

        let Some(start) = candidate else {
            continue;
        };
        if node.start_date == Some(start) {
            continue;
        }
        if let Some(previous) = node.start_date
            && previous > start
        {
            warnings.push(ScheduleWarning::ManualDateOverridden {
                node: id,
                previous_start: previous,
                new_start: start,
            });
        }

        let end = shift_date(start, span).ok_or_else(|| {
            Error::InvalidInput(format!(
                "{} cannot end {} day(s) after {}",
                node.label(),
                span,
                start
            ))
        })?;
        schedule::write_node_dates(conn, project_id, kind, id, Some(start), Some(end))?;
        tracing::debug!(project_id, %kind, node = id, %start, %end, "node rescheduled");
        if let Some(node) = nodes.get_mut(&id) {
            node.start_date = Some(start);
            node.end_date = Some(end);
        }
        updated += 1;
    }
    Ok(updated)
}

/// Recompute dates forward from the roots of both graphs.
///
/// Roots keep their start (undated work item roots take the project's
/// default start). Every other node starts at the latest date its
/// predecessors allow, keeping its span; the auto-scheduler wins over
/// manually set dates whenever the two differ.
pub fn recalculate_schedule(storage: &mut Storage, project_id: i64) -> Result<RecalcResult> {
    storage.immediate(|tx| {
        let project = projects::get_project(tx, project_id)?;
        let mut result = RecalcResult::default();
        result.phases_updated = propagate(
            tx,
            project_id,
            NodeKind::Phase,
            project.default_start,
            &mut result.warnings,
        )?;
        result.tasks_updated = propagate(
            tx,
            project_id,
            NodeKind::WorkItem,
            project.default_start,
            &mut result.warnings,
        )?;
        result.updated = result.phases_updated + result.tasks_updated;
        tracing::info!(
            project_id,
            phases = result.phases_updated,
            tasks = result.tasks_updated,
            warnings = result.warnings.len(),
            "schedule recalculated"
        );
        Ok(result)
    })
}

/// Copy current dates into the baseline of every node, replacing any previous baseline.
pub fn save_baseline(storage: &mut Storage, project_id: i64) -> Result<BaselineResult> {
    storage.immediate(|tx| {
        projects::get_project(tx, project_id)?;
        let phases = schedule::write_baseline(tx, project_id, NodeKind::Phase)?;
        let tasks = schedule::write_baseline(tx, project_id, NodeKind::WorkItem)?;
        tracing::info!(project_id, phases, tasks, "baseline saved");
        Ok(BaselineResult {
            baselined: phases + tasks,
            phases,
            tasks,
        })
    })
}

/// Start and end slip against the baseline for every baselined node.
pub fn schedule_variance(storage: &Storage, project_id: i64) -> Result<VarianceReport> {
    projects::get_project(storage.conn(), project_id)?;
    let slip = |current: Option<NaiveDate>, baseline: Option<NaiveDate>| match (current, baseline) {
        (Some(current), Some(baseline)) => Some((current - baseline).num_days()),
        _ => None,
    };

    let mut nodes = Vec::new();
    for kind in [NodeKind::Phase, NodeKind::WorkItem] {
        for node in schedule::load_nodes(storage.conn(), project_id, kind)? {
            if node.baseline_start_date.is_none() && node.baseline_end_date.is_none() {
                continue;
            }
            nodes.push(Variance {
                kind,
                id: node.id,
                start_slip_days: slip(node.start_date, node.baseline_start_date),
                end_slip_days: slip(node.end_date, node.baseline_end_date),
                name: node.name,
            });
        }
    }
    Ok(VarianceReport { nodes })
}

/// Manually set a node's dates (the drag-resize writer).
///
/// Giving only a start moves the node and keeps its span; giving only an end
/// keeps the current start. The resulting range is checked against the
/// stored dates. The next `recalculate_schedule` may move the node again.
pub fn set_dates(
    storage: &mut Storage,
    project_id: i64,
    kind: NodeKind,
    id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<ScheduleNode> {
    if start.is_none() && end.is_none() {
        return Err(Error::InvalidInput(
            "Provide a start date, an end date, or both".to_string(),
        ));
    }

    storage.immediate(|tx| {
        let node = schedule::get_node(tx, project_id, kind, id)?;
        let end = match (start, end) {
            (_, Some(end)) => Some(end),
            (Some(start), None) => match node.span() {
                Some(span) => Some(shift_date(start, span).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "{} cannot end {} day(s) after {}",
                        node.label(),
                        span,
                        start
                    ))
                })?),
                None => node.end_date,
            },
            (None, None) => node.end_date,
        };
        let start = start.or(node.start_date);
        if let (Some(start), Some(end)) = (start, end)
            && end < start
        {
            return Err(Error::InvalidInput(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }

        schedule::write_node_dates(tx, project_id, kind, id, start, end)?;
        if kind == NodeKind::WorkItem {
            let show = |d: Option<NaiveDate>| d.map(|d| d.to_string());
            items::insert_activity(
                tx,
                project_id,
                id,
                "rescheduled",
                show(node.start_date).as_deref(),
                show(start).as_deref(),
            )?;
        }
        tracing::info!(project_id, %kind, node = id, ?start, ?end, "dates set manually");
        schedule::get_node(tx, project_id, kind, id)
    })
}
