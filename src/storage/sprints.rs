//! Sprint and burndown snapshot rows.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::projects;
use crate::models::{Sprint, SprintSnapshot, SprintStatus};
use crate::{Error, Result};

const SPRINT_COLUMNS: &str = "id, project_id, name, goal, phase_id, status, start_date, end_date, \
     created_at, started_at, closed_at";

fn sprint_from_row(row: &Row<'_>) -> rusqlite::Result<Sprint> {
    Ok(Sprint {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        goal: row.get("goal")?,
        phase_id: row.get("phase_id")?,
        status: row.get("status")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        closed_at: row.get("closed_at")?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<SprintSnapshot> {
    Ok(SprintSnapshot {
        sprint_id: row.get("sprint_id")?,
        date: row.get("date")?,
        total_points: row.get("total_points")?,
        completed_points: row.get("completed_points")?,
    })
}

/// Create a PLANNING sprint. Unnamed sprints are called `Sprint {n}`.
pub fn insert_sprint(
    conn: &Connection,
    project_id: i64,
    name: Option<&str>,
    goal: Option<&str>,
    phase_id: Option<i64>,
) -> Result<Sprint> {
    let count = projects::next_sprint_count(conn, project_id)?;
    let name = match name.map(str::trim) {
        Some("") => {
            return Err(Error::InvalidInput("Sprint name cannot be empty".to_string()));
        }
        Some(name) => name.to_string(),
        None => format!("Sprint {}", count),
    };

    conn.execute(
        "INSERT INTO sprints (project_id, name, goal, phase_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            project_id,
            name,
            goal,
            phase_id,
            SprintStatus::Planning,
            Utc::now()
        ],
    )?;
    get_sprint(conn, project_id, conn.last_insert_rowid())
}

pub fn get_sprint(conn: &Connection, project_id: i64, id: i64) -> Result<Sprint> {
    conn.query_row(
        &format!(
            "SELECT {} FROM sprints WHERE project_id = ?1 AND id = ?2",
            SPRINT_COLUMNS
        ),
        params![project_id, id],
        sprint_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Sprint {} not found", id)))
}

pub fn list_sprints(conn: &Connection, project_id: i64) -> Result<Vec<Sprint>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sprints WHERE project_id = ?1 ORDER BY id",
        SPRINT_COLUMNS
    ))?;
    let sprints = stmt
        .query_map([project_id], sprint_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sprints)
}

/// The project's ACTIVE sprint, if any.
pub fn active_sprint(conn: &Connection, project_id: i64) -> Result<Option<Sprint>> {
    let sprint = conn
        .query_row(
            &format!(
                "SELECT {} FROM sprints WHERE project_id = ?1 AND status = ?2 LIMIT 1",
                SPRINT_COLUMNS
            ),
            params![project_id, SprintStatus::Active],
            sprint_from_row,
        )
        .optional()?;
    Ok(sprint)
}

/// The most recently created PLANNING sprint, if any.
///
/// Ids are AUTOINCREMENT, so they order sprints by creation.
pub fn latest_planning_sprint(conn: &Connection, project_id: i64) -> Result<Option<Sprint>> {
    let sprint = conn
        .query_row(
            &format!(
                "SELECT {} FROM sprints WHERE project_id = ?1 AND status = ?2
                 ORDER BY id DESC LIMIT 1",
                SPRINT_COLUMNS
            ),
            params![project_id, SprintStatus::Planning],
            sprint_from_row,
        )
        .optional()?;
    Ok(sprint)
}

pub fn mark_active(
    conn: &Connection,
    project_id: i64,
    id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Sprint> {
    conn.execute(
        "UPDATE sprints SET status = ?1, start_date = ?2, end_date = ?3, started_at = ?4
         WHERE project_id = ?5 AND id = ?6",
        params![
            SprintStatus::Active,
            start_date,
            end_date,
            Utc::now(),
            project_id,
            id
        ],
    )?;
    get_sprint(conn, project_id, id)
}

pub fn mark_closed(conn: &Connection, project_id: i64, id: i64) -> Result<Sprint> {
    conn.execute(
        "UPDATE sprints SET status = ?1, closed_at = ?2 WHERE project_id = ?3 AND id = ?4",
        params![SprintStatus::Closed, Utc::now(), project_id, id],
    )?;
    get_sprint(conn, project_id, id)
}

/// Sum story points over the sprint's non-archived items.
///
/// Returns `(total, completed)` where completed counts items whose status
/// equals `done_status`.
pub fn sprint_points(
    conn: &Connection,
    project_id: i64,
    sprint_id: i64,
    done_status: &str,
) -> Result<(u32, u32)> {
    let (total, completed): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(COALESCE(story_points, 0)), 0),
                COALESCE(SUM(CASE WHEN status = ?3 THEN COALESCE(story_points, 0) ELSE 0 END), 0)
         FROM work_items
         WHERE project_id = ?1 AND sprint_id = ?2 AND archived_at IS NULL",
        params![project_id, sprint_id, done_status],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((
        u32::try_from(total).unwrap_or(u32::MAX),
        u32::try_from(completed).unwrap_or(u32::MAX),
    ))
}

/// Insert or overwrite the snapshot for `(sprint_id, date)`.
pub fn upsert_snapshot(conn: &Connection, snapshot: &SprintSnapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO sprint_snapshots (sprint_id, date, total_points, completed_points)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(sprint_id, date) DO UPDATE SET
            total_points = excluded.total_points,
            completed_points = excluded.completed_points",
        params![
            snapshot.sprint_id,
            snapshot.date,
            snapshot.total_points,
            snapshot.completed_points
        ],
    )?;
    Ok(())
}

/// Snapshots in date order.
pub fn list_snapshots(conn: &Connection, sprint_id: i64) -> Result<Vec<SprintSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT sprint_id, date, total_points, completed_points
         FROM sprint_snapshots WHERE sprint_id = ?1 ORDER BY date",
    )?;
    let snapshots = stmt
        .query_map([sprint_id], snapshot_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Methodology;
    use crate::storage::NewWorkItem;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_default_sprint_names_follow_count() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let project =
            projects::insert_project(storage.conn(), "Apollo", Methodology::Agile, None, None)
                .unwrap();

        let first = insert_sprint(storage.conn(), project.id, None, None, None).unwrap();
        let named =
            insert_sprint(storage.conn(), project.id, Some("Hardening"), None, None).unwrap();
        let third = insert_sprint(storage.conn(), project.id, None, None, None).unwrap();

        assert_eq!(first.name, "Sprint 1");
        assert_eq!(named.name, "Hardening");
        assert_eq!(third.name, "Sprint 3");
        assert_eq!(first.status, SprintStatus::Planning);
        assert_eq!(
            latest_planning_sprint(storage.conn(), project.id).unwrap().unwrap().id,
            third.id
        );
    }

    #[test]
    fn test_store_rejects_second_active_sprint() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let project =
            projects::insert_project(storage.conn(), "Apollo", Methodology::Agile, None, None)
                .unwrap();
        let a = insert_sprint(storage.conn(), project.id, None, None, None).unwrap();
        let b = insert_sprint(storage.conn(), project.id, None, None, None).unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 13).unwrap();

        mark_active(storage.conn(), project.id, a.id, start, end).unwrap();
        let result = mark_active(storage.conn(), project.id, b.id, start, end);
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_snapshot_upsert_overwrites_same_day() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let project =
            projects::insert_project(storage.conn(), "Apollo", Methodology::Agile, None, None)
                .unwrap();
        let sprint = insert_sprint(storage.conn(), project.id, None, None, None).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let mut snapshot = SprintSnapshot {
            sprint_id: sprint.id,
            date,
            total_points: 10,
            completed_points: 0,
        };
        upsert_snapshot(storage.conn(), &snapshot).unwrap();
        snapshot.completed_points = 3;
        upsert_snapshot(storage.conn(), &snapshot).unwrap();

        let snapshots = list_snapshots(storage.conn(), sprint.id).unwrap();
        assert_eq!(snapshots, vec![snapshot]);
    }

    #[test]
    fn test_points_count_status_not_column() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = storage
            .create_project("Apollo", Methodology::Agile, None, None)
            .unwrap();
        let sprint = insert_sprint(storage.conn(), project.id, None, None, None).unwrap();
        for (title, points, status) in [("A", 3, "Done"), ("B", 5, "Doing"), ("C", 2, "done")] {
            storage
                .create_work_item(
                    project.id,
                    NewWorkItem {
                        sprint_id: Some(sprint.id),
                        story_points: Some(points),
                        status: Some(status.to_string()),
                        ..NewWorkItem::titled(title)
                    },
                )
                .unwrap();
        }

        let (total, completed) =
            sprint_points(storage.conn(), project.id, sprint.id, "Done").unwrap();
        assert_eq!(total, 10);
        // Exact label match only
        assert_eq!(completed, 3);
    }
}
