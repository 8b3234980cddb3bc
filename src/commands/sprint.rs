//! Sprint lifecycle: PLANNING -> ACTIVE -> CLOSED, snapshots, and rollover.
//!
//! The one-active-sprint rule is checked inside the same immediate
//! transaction that flips the status, and the store's partial unique index
//! on ACTIVE sprints backs it up.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::{Output, json};
use crate::models::{
    Project, RolloverAction, RolloverDecision, Sprint, SprintSnapshot, SprintStatus,
};
use crate::storage::{Storage, items, projects, schedule, sprints};
use crate::{Error, Result};

/// A lifecycle transition and the snapshot it recorded.
#[derive(Debug, Serialize)]
pub struct SprintTransition {
    pub sprint: Sprint,
    pub snapshot: SprintSnapshot,
}

impl Output for SprintTransition {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "{} is {} ({}/{} points done)",
            self.sprint.name,
            self.sprint.status,
            self.snapshot.completed_points,
            self.snapshot.total_points
        )
    }
}

impl Output for SprintSnapshot {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "{}: {} of {} points done, {} remaining",
            self.date,
            self.completed_points,
            self.total_points,
            self.remaining_points()
        )
    }
}

/// What happened to one rollover decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolloverOutcome {
    pub work_item: i64,
    pub action: RolloverAction,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RolloverResult {
    pub sprint_id: i64,
    /// Sprint that received NEXT_SPRINT items, if any were moved
    pub next_sprint_id: Option<i64>,
    pub outcomes: Vec<RolloverOutcome>,
}

impl RolloverResult {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied).count()
    }
}

impl Output for RolloverResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Rolled over {} of {} item(s)",
            self.applied(),
            self.outcomes.len()
        )];
        if let Some(next) = self.next_sprint_id {
            lines.push(format!("  Next sprint: {}", next));
        }
        for outcome in &self.outcomes {
            match &outcome.reason {
                Some(reason) => lines.push(format!("  #{} skipped: {}", outcome.work_item, reason)),
                None => lines.push(format!("  #{} -> {:?}", outcome.work_item, outcome.action)),
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub total_points: u32,
    pub completed_points: u32,
    pub remaining_points: u32,
    /// Straight-line target from the first sample's total down to zero at the end date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal_remaining: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct Burndown {
    pub sprint: Sprint,
    pub points: Vec<BurndownPoint>,
}

impl Output for Burndown {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Burndown for {}", self.sprint.name)];
        if self.points.is_empty() {
            lines.push("  (no snapshots)".to_string());
        }
        for point in &self.points {
            let ideal = point
                .ideal_remaining
                .map(|i| format!(" (ideal {:.1})", i))
                .unwrap_or_default();
            lines.push(format!(
                "  {} remaining {}{}",
                point.date, point.remaining_points, ideal
            ));
        }
        lines.join("\n")
    }
}

fn require_status(sprint: &Sprint, expected: SprintStatus) -> Result<()> {
    if sprint.status != expected {
        tracing::warn!(
            sprint = %sprint.name,
            actual = %sprint.status,
            expected = %expected,
            "sprint transition rejected"
        );
        return Err(Error::InvalidSprintState {
            sprint: sprint.name.clone(),
            expected,
            actual: sprint.status,
        });
    }
    Ok(())
}

/// Recompute the sprint's totals and upsert the snapshot for `date`.
fn take_snapshot(
    conn: &Connection,
    project: &Project,
    sprint_id: i64,
    date: NaiveDate,
) -> Result<SprintSnapshot> {
    let (total_points, completed_points) =
        sprints::sprint_points(conn, project.id, sprint_id, &project.done_status)?;
    let snapshot = SprintSnapshot {
        sprint_id,
        date,
        total_points,
        completed_points,
    };
    sprints::upsert_snapshot(conn, &snapshot)?;
    tracing::debug!(sprint_id, %date, total_points, completed_points, "snapshot recorded");
    Ok(snapshot)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Create a PLANNING sprint, optionally owned by a phase.
pub fn create_sprint(
    storage: &mut Storage,
    project_id: i64,
    name: Option<&str>,
    goal: Option<&str>,
    phase_id: Option<i64>,
) -> Result<Sprint> {
    storage.immediate(|tx| {
        projects::get_project(tx, project_id)?;
        if let Some(phase_id) = phase_id {
            schedule::get_phase(tx, project_id, phase_id)?;
        }
        let sprint = sprints::insert_sprint(tx, project_id, name, goal, phase_id)?;
        tracing::info!(project_id, sprint = %sprint.name, "sprint created");
        Ok(sprint)
    })
}

/// PLANNING -> ACTIVE, recording the opening snapshot.
pub fn start_sprint(
    storage: &mut Storage,
    project_id: i64,
    sprint_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<SprintTransition> {
    storage.immediate(|tx| {
        let project = projects::get_project(tx, project_id)?;
        let sprint = sprints::get_sprint(tx, project_id, sprint_id)?;
        require_status(&sprint, SprintStatus::Planning)?;

        if let Some(active) = sprints::active_sprint(tx, project_id)? {
            tracing::warn!(
                project_id,
                sprint = %sprint.name,
                active = %active.name,
                "sprint start rejected: another sprint is active"
            );
            return Err(Error::SprintAlreadyActive {
                active: active.name,
            });
        }
        if end_date <= start_date {
            return Err(Error::InvalidInput(format!(
                "Sprint end {} must be after its start {}",
                end_date, start_date
            )));
        }

        let sprint = sprints::mark_active(tx, project_id, sprint_id, start_date, end_date)?;
        let snapshot = take_snapshot(tx, &project, sprint_id, today())?;
        tracing::info!(project_id, sprint = %sprint.name, %start_date, %end_date, "sprint started");
        Ok(SprintTransition { sprint, snapshot })
    })
}

/// ACTIVE -> CLOSED, recording the final snapshot for today.
pub fn close_sprint(
    storage: &mut Storage,
    project_id: i64,
    sprint_id: i64,
) -> Result<SprintTransition> {
    storage.immediate(|tx| {
        let project = projects::get_project(tx, project_id)?;
        let sprint = sprints::get_sprint(tx, project_id, sprint_id)?;
        require_status(&sprint, SprintStatus::Active)?;

        let snapshot = take_snapshot(tx, &project, sprint_id, today())?;
        let sprint = sprints::mark_closed(tx, project_id, sprint_id)?;
        tracing::info!(
            project_id,
            sprint = %sprint.name,
            completed = snapshot.completed_points,
            total = snapshot.total_points,
            "sprint closed"
        );
        Ok(SprintTransition { sprint, snapshot })
    })
}

/// Upsert today's snapshot for an ACTIVE sprint. Safe to call repeatedly.
pub fn record_snapshot(
    storage: &mut Storage,
    project_id: i64,
    sprint_id: i64,
) -> Result<SprintSnapshot> {
    record_snapshot_on(storage, project_id, sprint_id, today())
}

/// Upsert the snapshot for an explicit date.
pub fn record_snapshot_on(
    storage: &mut Storage,
    project_id: i64,
    sprint_id: i64,
    date: NaiveDate,
) -> Result<SprintSnapshot> {
    storage.immediate(|tx| {
        let project = projects::get_project(tx, project_id)?;
        let sprint = sprints::get_sprint(tx, project_id, sprint_id)?;
        require_status(&sprint, SprintStatus::Active)?;
        take_snapshot(tx, &project, sprint_id, date)
    })
}

/// Redistribute unfinished items of a CLOSED sprint.
///
/// Decisions are applied independently inside one transaction: a decision
/// for an item that is missing, archived, already done, or no longer in the
/// sprint is skipped with a reason and never aborts the rest. The target
/// for NEXT_SPRINT is the most recently created PLANNING sprint, created on
/// first use when none exists.
pub fn rollover(
    storage: &mut Storage,
    project_id: i64,
    sprint_id: i64,
    decisions: &[RolloverDecision],
) -> Result<RolloverResult> {
    storage.immediate(|tx| {
        let project = projects::get_project(tx, project_id)?;
        let sprint = sprints::get_sprint(tx, project_id, sprint_id)?;
        require_status(&sprint, SprintStatus::Closed)?;

        let mut next: Option<Sprint> = None;
        let mut outcomes = Vec::with_capacity(decisions.len());

        for decision in decisions {
            let skip = |reason: &str| RolloverOutcome {
                work_item: decision.work_item,
                action: decision.action,
                applied: false,
                reason: Some(reason.to_string()),
            };

            let item = match items::get_work_item(tx, project_id, decision.work_item) {
                Ok(item) => item,
                Err(Error::NotFound(_)) => {
                    outcomes.push(skip("not found"));
                    continue;
                }
                Err(e) => return Err(e),
            };
            let reason = if item.is_archived() {
                Some("archived")
            } else if item.sprint_id != Some(sprint.id) {
                Some("not in this sprint")
            } else if item.status == project.done_status {
                Some("already done")
            } else {
                None
            };
            if let Some(reason) = reason {
                tracing::debug!(number = item.number, reason, "rollover decision skipped");
                outcomes.push(skip(reason));
                continue;
            }

            let destination = match decision.action {
                RolloverAction::NextSprint => {
                    let target = match next.take() {
                        Some(target) => target,
                        None => match sprints::latest_planning_sprint(tx, project_id)? {
                            Some(target) => target,
                            None => {
                                sprints::insert_sprint(tx, project_id, None, None, sprint.phase_id)?
                            }
                        },
                    };
                    items::set_sprint(tx, project_id, item.number, Some(target.id))?;
                    let name = target.name.clone();
                    next = Some(target);
                    name
                }
                RolloverAction::Backlog => {
                    items::set_sprint(tx, project_id, item.number, None)?;
                    "backlog".to_string()
                }
            };

            items::insert_activity(
                tx,
                project_id,
                item.number,
                "rolled_over",
                Some(&sprint.name),
                Some(&destination),
            )?;
            tracing::info!(
                project_id,
                number = item.number,
                from = %sprint.name,
                to = %destination,
                "rollover decision applied"
            );
            outcomes.push(RolloverOutcome {
                work_item: item.number,
                action: decision.action,
                applied: true,
                reason: None,
            });
        }

        Ok(RolloverResult {
            sprint_id,
            next_sprint_id: next.map(|s| s.id),
            outcomes,
        })
    })
}

/// Snapshots of a sprint with the ideal burndown line.
pub fn burndown(storage: &Storage, project_id: i64, sprint_id: i64) -> Result<Burndown> {
    let sprint = storage.get_sprint(project_id, sprint_id)?;
    let snapshots = storage.list_snapshots(sprint_id)?;

    let baseline = snapshots.first().map(|s| s.total_points as f64);
    let ideal = |date: NaiveDate| -> Option<f64> {
        let (start, end, total) = (sprint.start_date?, sprint.end_date?, baseline?);
        let length = (end - start).num_days();
        if length <= 0 {
            return None;
        }
        let elapsed = (date - start).num_days().clamp(0, length);
        Some(total * (length - elapsed) as f64 / length as f64)
    };

    let points = snapshots
        .iter()
        .map(|s| BurndownPoint {
            date: s.date,
            total_points: s.total_points,
            completed_points: s.completed_points,
            remaining_points: s.remaining_points(),
            ideal_remaining: ideal(s.date),
        })
        .collect();

    Ok(Burndown { sprint, points })
}
