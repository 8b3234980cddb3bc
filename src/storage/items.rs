//! Work item, checklist, and activity rows.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{projects, schedule, sprints};
use crate::models::outline::Outline;
use crate::models::{
    Activity, ChecklistItem, ChecklistKind, MAX_OFFSET_DAYS, Sprint, SprintStatus, WorkItem, Wsjf,
    shift_date,
};
use crate::{Error, Result};

const WORK_ITEM_COLUMNS: &str = "project_id, number, title, description, status, column_id, \
     position, sprint_id, phase_id, story_points, business_value, time_criticality, \
     risk_reduction, job_size, duration, start_date, end_date, baseline_start_date, \
     baseline_end_date, is_milestone, parent_number, outline_level, outline_position, \
     wbs_index, archived_at, created_at, updated_at";

/// Fields accepted when creating a work item.
#[derive(Debug, Clone, Default)]
pub struct NewWorkItem {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to the name of the column the item lands in
    pub status: Option<String>,
    /// Defaults to the project's first BACKLOG column
    pub column_id: Option<i64>,
    pub sprint_id: Option<i64>,
    pub phase_id: Option<i64>,
    pub story_points: Option<u32>,
    pub wsjf: Wsjf,
    pub duration: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_milestone: bool,
    /// WBS parent; the item is appended as its last child
    pub parent: Option<i64>,
}

impl NewWorkItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        project_id: row.get("project_id")?,
        number: row.get("number")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        column_id: row.get("column_id")?,
        position: row.get("position")?,
        sprint_id: row.get("sprint_id")?,
        phase_id: row.get("phase_id")?,
        story_points: row.get("story_points")?,
        wsjf: Wsjf {
            business_value: row.get("business_value")?,
            time_criticality: row.get("time_criticality")?,
            risk_reduction: row.get("risk_reduction")?,
            job_size: row.get("job_size")?,
        },
        duration: row.get("duration")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        baseline_start_date: row.get("baseline_start_date")?,
        baseline_end_date: row.get("baseline_end_date")?,
        is_milestone: row.get("is_milestone")?,
        parent_number: row.get("parent_number")?,
        outline_level: row.get("outline_level")?,
        outline_position: row.get("outline_position")?,
        wbs_index: row.get("wbs_index")?,
        archived_at: row.get("archived_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn checklist_from_row(row: &Row<'_>) -> rusqlite::Result<ChecklistItem> {
    Ok(ChecklistItem {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        work_item: row.get("work_item")?,
        kind: row.get("kind")?,
        label: row.get("label")?,
        checked: row.get("checked")?,
        created_at: row.get("created_at")?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        work_item: row.get("work_item")?,
        action: row.get("action")?,
        from_value: row.get("from_value")?,
        to_value: row.get("to_value")?,
        created_at: row.get("created_at")?,
    })
}

/// Fill in `end` from `start + duration` and reject inverted ranges.
fn resolve_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    duration: Option<i64>,
) -> Result<Option<NaiveDate>> {
    if duration.is_some_and(|days| days < 0) {
        return Err(Error::InvalidInput("Duration cannot be negative".to_string()));
    }
    if duration.is_some_and(|days| days > MAX_OFFSET_DAYS) {
        return Err(Error::InvalidInput(format!(
            "Duration cannot exceed {} days",
            MAX_OFFSET_DAYS
        )));
    }
    let end = match (start, end, duration) {
        (Some(start), None, Some(days)) => Some(shift_date(start, days).ok_or_else(|| {
            Error::InvalidInput(format!("{} plus {} day(s) is out of range", start, days))
        })?),
        (_, end, _) => end,
    };
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(Error::InvalidInput(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }
    }
    Ok(end)
}

/// A sprint that can still take work items.
fn open_sprint(conn: &Connection, project_id: i64, sprint_id: i64) -> Result<Sprint> {
    let sprint = sprints::get_sprint(conn, project_id, sprint_id)?;
    if sprint.status == SprintStatus::Closed {
        return Err(Error::Precondition(format!(
            "Sprint '{}' is CLOSED and cannot take work items",
            sprint.name
        )));
    }
    Ok(sprint)
}

pub fn insert_work_item(conn: &Connection, project_id: i64, new: NewWorkItem) -> Result<WorkItem> {
    let project = projects::get_project(conn, project_id)?;
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Title cannot be empty".to_string()));
    }

    let column = match new.column_id {
        Some(id) => Some(projects::get_column(conn, project_id, id)?),
        None => projects::default_column(conn, project_id)?,
    };
    if let Some(sprint_id) = new.sprint_id {
        open_sprint(conn, project_id, sprint_id)?;
    }
    if let Some(phase_id) = new.phase_id {
        schedule::get_phase(conn, project_id, phase_id)?;
    }
    let end_date = resolve_dates(new.start_date, new.end_date, new.duration)?;

    let (story_points, wsjf) = if project.methodology.tracks_points() {
        (new.story_points, new.wsjf)
    } else {
        (None, Wsjf::default())
    };

    let status = new
        .status
        .or_else(|| column.as_ref().map(|c| c.name.clone()))
        .unwrap_or_else(|| "Backlog".to_string());
    let column_id = column.as_ref().map(|c| c.id);
    let position = match column_id {
        Some(id) => column_order(conn, project_id, id)?.len() as i64,
        None => 0,
    };

    let outline_position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(outline_position) + 1, 0) FROM work_items
         WHERE project_id = ?1 AND archived_at IS NULL",
        [project_id],
        |row| row.get(0),
    )?;

    let number = projects::next_item_number(conn, project_id)?;
    let now = Utc::now();
    conn.execute(
        "INSERT INTO work_items (project_id, number, title, description, status, column_id,
            position, sprint_id, phase_id, story_points, business_value, time_criticality,
            risk_reduction, job_size, duration, start_date, end_date, is_milestone,
            outline_position, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20, ?20)",
        params![
            project_id,
            number,
            title,
            new.description,
            status,
            column_id,
            position,
            new.sprint_id,
            new.phase_id,
            story_points,
            wsjf.business_value,
            wsjf.time_criticality,
            wsjf.risk_reduction,
            wsjf.job_size,
            new.duration,
            new.start_date,
            end_date,
            new.is_milestone,
            outline_position,
            now,
        ],
    )?;

    let mut outline = load_outline(conn, project_id)?;
    if let Some(parent) = new.parent {
        outline.reparent(number, Some(parent))?;
    }
    write_outline(conn, project_id, &outline)?;

    insert_activity(conn, project_id, number, "created", None, Some(&status))?;
    get_work_item(conn, project_id, number)
}

pub fn get_work_item(conn: &Connection, project_id: i64, number: i64) -> Result<WorkItem> {
    conn.query_row(
        &format!(
            "SELECT {} FROM work_items WHERE project_id = ?1 AND number = ?2",
            WORK_ITEM_COLUMNS
        ),
        params![project_id, number],
        item_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Work item #{} not found", number)))
}

/// Fetch a work item that has not been archived.
pub fn get_live_work_item(conn: &Connection, project_id: i64, number: i64) -> Result<WorkItem> {
    let item = get_work_item(conn, project_id, number)?;
    if item.is_archived() {
        return Err(Error::NotFound(format!("Work item #{} not found", number)));
    }
    Ok(item)
}

/// List work items in WBS order.
pub fn list_work_items(
    conn: &Connection,
    project_id: i64,
    include_archived: bool,
) -> Result<Vec<WorkItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM work_items
         WHERE project_id = ?1 AND (?2 OR archived_at IS NULL)
         ORDER BY outline_position, number",
        WORK_ITEM_COLUMNS
    ))?;
    let items = stmt
        .query_map(params![project_id, include_archived], item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// Non-archived items linked to a sprint.
pub fn list_sprint_items(
    conn: &Connection,
    project_id: i64,
    sprint_id: i64,
) -> Result<Vec<WorkItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM work_items
         WHERE project_id = ?1 AND sprint_id = ?2 AND archived_at IS NULL
         ORDER BY number",
        WORK_ITEM_COLUMNS
    ))?;
    let items = stmt
        .query_map(params![project_id, sprint_id], item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// Persist the editable fields of a work item.
pub fn update_work_item(conn: &Connection, item: &WorkItem) -> Result<WorkItem> {
    let project = projects::get_project(conn, item.project_id)?;
    let current = get_live_work_item(conn, item.project_id, item.number)?;

    if item.title.trim().is_empty() {
        return Err(Error::InvalidInput("Title cannot be empty".to_string()));
    }
    if item.status.trim().is_empty() {
        return Err(Error::InvalidInput("Status cannot be empty".to_string()));
    }
    if let Some(sprint_id) = item.sprint_id
        && item.sprint_id != current.sprint_id
    {
        open_sprint(conn, item.project_id, sprint_id)?;
    }
    if let Some(phase_id) = item.phase_id {
        schedule::get_phase(conn, item.project_id, phase_id)?;
    }
    let end_date = resolve_dates(item.start_date, item.end_date, item.duration)?;

    let (story_points, wsjf) = if project.methodology.tracks_points() {
        (item.story_points, item.wsjf)
    } else {
        (None, Wsjf::default())
    };

    conn.execute(
        "UPDATE work_items SET title = ?1, description = ?2, status = ?3, sprint_id = ?4,
            phase_id = ?5, story_points = ?6, business_value = ?7, time_criticality = ?8,
            risk_reduction = ?9, job_size = ?10, duration = ?11, start_date = ?12,
            end_date = ?13, is_milestone = ?14, updated_at = ?15
         WHERE project_id = ?16 AND number = ?17",
        params![
            item.title.trim(),
            item.description,
            item.status.trim(),
            item.sprint_id,
            item.phase_id,
            story_points,
            wsjf.business_value,
            wsjf.time_criticality,
            wsjf.risk_reduction,
            wsjf.job_size,
            item.duration,
            item.start_date,
            end_date,
            item.is_milestone,
            Utc::now(),
            item.project_id,
            item.number,
        ],
    )?;

    if current.status != item.status.trim() {
        insert_activity(
            conn,
            item.project_id,
            item.number,
            "status_changed",
            Some(&current.status),
            Some(item.status.trim()),
        )?;
    }
    get_work_item(conn, item.project_id, item.number)
}

/// Soft-delete a work item and drop it from its column and the outline.
pub fn archive_work_item(conn: &Connection, project_id: i64, number: i64) -> Result<WorkItem> {
    let item = get_work_item(conn, project_id, number)?;
    if item.is_archived() {
        return Ok(item);
    }

    conn.execute(
        "UPDATE work_items SET archived_at = ?1, updated_at = ?1
         WHERE project_id = ?2 AND number = ?3",
        params![Utc::now(), project_id, number],
    )?;
    if let Some(column_id) = item.column_id {
        let order = column_order(conn, project_id, column_id)?;
        write_column_order(conn, project_id, column_id, &order)?;
    }
    let outline = load_outline(conn, project_id)?;
    write_outline(conn, project_id, &outline)?;

    insert_activity(conn, project_id, number, "archived", None, None)?;
    get_work_item(conn, project_id, number)
}

/// Count non-archived items currently in a column.
pub fn count_in_column(conn: &Connection, project_id: i64, column_id: i64) -> Result<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM work_items
         WHERE project_id = ?1 AND column_id = ?2 AND archived_at IS NULL",
        params![project_id, column_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Non-archived item numbers in a column, top to bottom.
pub fn column_order(conn: &Connection, project_id: i64, column_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT number FROM work_items
         WHERE project_id = ?1 AND column_id = ?2 AND archived_at IS NULL
         ORDER BY position, number",
    )?;
    let numbers = stmt
        .query_map(params![project_id, column_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(numbers)
}

/// Place `order` into the column with dense positions `0..n`.
pub fn write_column_order(
    conn: &Connection,
    project_id: i64,
    column_id: i64,
    order: &[i64],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "UPDATE work_items SET column_id = ?1, position = ?2
         WHERE project_id = ?3 AND number = ?4",
    )?;
    for (position, number) in order.iter().enumerate() {
        stmt.execute(params![column_id, position as i64, project_id, number])?;
    }
    Ok(())
}

/// Relink an item to a sprint (or none).
pub fn set_sprint(
    conn: &Connection,
    project_id: i64,
    number: i64,
    sprint_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE work_items SET sprint_id = ?1, updated_at = ?2
         WHERE project_id = ?3 AND number = ?4",
        params![sprint_id, Utc::now(), project_id, number],
    )?;
    Ok(())
}

// === Outline ===

/// Rebuild the WBS tree from non-archived items.
pub fn load_outline(conn: &Connection, project_id: i64) -> Result<Outline> {
    let mut stmt = conn.prepare(
        "SELECT number, parent_number FROM work_items
         WHERE project_id = ?1 AND archived_at IS NULL
         ORDER BY outline_position, number",
    )?;
    let rows = stmt
        .query_map([project_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(i64, Option<i64>)>>>()?;
    Ok(Outline::from_rows(rows))
}

/// Write derived parent/level/position/index back for every row that changed.
///
/// Returns the numbers of the rows rewritten.
pub fn write_outline(conn: &Connection, project_id: i64, outline: &Outline) -> Result<Vec<i64>> {
    let mut select = conn.prepare(
        "SELECT parent_number, outline_level, outline_position, wbs_index FROM work_items
         WHERE project_id = ?1 AND number = ?2",
    )?;
    let mut update = conn.prepare(
        "UPDATE work_items SET parent_number = ?1, outline_level = ?2, outline_position = ?3,
            wbs_index = ?4
         WHERE project_id = ?5 AND number = ?6",
    )?;

    let mut changed = Vec::new();
    for entry in outline.entries() {
        let current: (Option<i64>, u32, i64, String) =
            select.query_row(params![project_id, entry.number], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
        let desired = (entry.parent, entry.level, entry.position, entry.wbs_index);
        if current != desired {
            update.execute(params![
                desired.0,
                desired.1,
                desired.2,
                desired.3,
                project_id,
                entry.number
            ])?;
            changed.push(entry.number);
        }
    }
    Ok(changed)
}

// === Checklists ===

pub fn insert_checklist_item(
    conn: &Connection,
    project_id: i64,
    work_item: i64,
    kind: ChecklistKind,
    label: &str,
) -> Result<ChecklistItem> {
    get_live_work_item(conn, project_id, work_item)?;
    let label = label.trim();
    if label.is_empty() {
        return Err(Error::InvalidInput("Checklist label cannot be empty".to_string()));
    }

    conn.execute(
        "INSERT INTO checklist_items (project_id, work_item, kind, label, checked, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![project_id, work_item, kind, label, Utc::now()],
    )?;
    get_checklist_item(conn, project_id, conn.last_insert_rowid())
}

pub fn get_checklist_item(conn: &Connection, project_id: i64, id: i64) -> Result<ChecklistItem> {
    conn.query_row(
        "SELECT id, project_id, work_item, kind, label, checked, created_at
         FROM checklist_items WHERE project_id = ?1 AND id = ?2",
        params![project_id, id],
        checklist_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Checklist item {} not found", id)))
}

pub fn set_checklist_checked(
    conn: &Connection,
    project_id: i64,
    id: i64,
    checked: bool,
) -> Result<ChecklistItem> {
    get_checklist_item(conn, project_id, id)?;
    conn.execute(
        "UPDATE checklist_items SET checked = ?1 WHERE project_id = ?2 AND id = ?3",
        params![checked, project_id, id],
    )?;
    get_checklist_item(conn, project_id, id)
}

pub fn list_checklist(
    conn: &Connection,
    project_id: i64,
    work_item: i64,
) -> Result<Vec<ChecklistItem>> {
    get_work_item(conn, project_id, work_item)?;
    let mut stmt = conn.prepare(
        "SELECT id, project_id, work_item, kind, label, checked, created_at
         FROM checklist_items WHERE project_id = ?1 AND work_item = ?2
         ORDER BY kind, id",
    )?;
    let items = stmt
        .query_map(params![project_id, work_item], checklist_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// Count unchecked Definition of Done entries on a work item.
pub fn count_unchecked_dod(conn: &Connection, project_id: i64, work_item: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM checklist_items
         WHERE project_id = ?1 AND work_item = ?2 AND kind = ?3 AND checked = 0",
        params![project_id, work_item, ChecklistKind::Dod],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

// === Activity ===

pub fn insert_activity(
    conn: &Connection,
    project_id: i64,
    work_item: i64,
    action: &str,
    from_value: Option<&str>,
    to_value: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO activities (project_id, work_item, action, from_value, to_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![project_id, work_item, action, from_value, to_value, Utc::now()],
    )?;
    Ok(())
}

/// Activity records, oldest first.
pub fn list_activity(
    conn: &Connection,
    project_id: i64,
    work_item: Option<i64>,
) -> Result<Vec<Activity>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, work_item, action, from_value, to_value, created_at
         FROM activities
         WHERE project_id = ?1 AND (?2 IS NULL OR work_item = ?2)
         ORDER BY id",
    )?;
    let activities = stmt
        .query_map(params![project_id, work_item], activity_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(activities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnType, Methodology};
    use crate::storage::Storage;
    use crate::test_utils::{TestEnv, item, seed_board};

    #[test]
    fn test_numbers_are_sequential_per_project() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        let other = storage
            .create_project("Gemini", Methodology::Agile, None, None)
            .unwrap();

        assert_eq!(item(&mut storage, board.project.id, "One"), 1);
        assert_eq!(item(&mut storage, board.project.id, "Two"), 2);
        assert_eq!(item(&mut storage, other.id, "Elsewhere"), 1);
    }

    #[test]
    fn test_new_item_lands_in_backlog_column() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = storage
            .create_project("Apollo", Methodology::Agile, None, None)
            .unwrap();
        let todo = storage
            .create_column(project.id, "To Do", ColumnType::Todo, "kanban", None)
            .unwrap();
        let backlog = storage
            .create_column(project.id, "Icebox", ColumnType::Backlog, "kanban", None)
            .unwrap();

        let first = storage
            .create_work_item(project.id, NewWorkItem::titled("First"))
            .unwrap();
        let second = storage
            .create_work_item(project.id, NewWorkItem::titled("Second"))
            .unwrap();

        assert_eq!(first.column_id, Some(backlog.id));
        assert_eq!(first.status, "Icebox");
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert_ne!(first.column_id, Some(todo.id));
    }

    #[test]
    fn test_item_without_columns_has_no_lane() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = storage
            .create_project("Apollo", Methodology::Waterfall, None, None)
            .unwrap();
        let created = storage
            .create_work_item(project.id, NewWorkItem::titled("Design"))
            .unwrap();

        assert_eq!(created.column_id, None);
        assert_eq!(created.status, "Backlog");
        assert_eq!(created.wbs_index, "1");
        assert_eq!(created.outline_level, 1);
    }

    #[test]
    fn test_waterfall_forces_points_to_zero() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = storage
            .create_project("Dam", Methodology::Waterfall, None, None)
            .unwrap();
        let new = NewWorkItem {
            story_points: Some(8),
            wsjf: Wsjf {
                business_value: 5,
                time_criticality: 3,
                risk_reduction: 1,
                job_size: 2,
            },
            ..NewWorkItem::titled("Pour foundation")
        };
        let mut created = storage.create_work_item(project.id, new).unwrap();
        assert_eq!(created.points(), 0);
        assert_eq!(created.wsjf, Wsjf::default());

        created.story_points = Some(3);
        let updated = storage.update_work_item(&created).unwrap();
        assert_eq!(updated.points(), 0);
    }

    #[test]
    fn test_end_date_derived_from_duration() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = storage
            .create_project("Dam", Methodology::Waterfall, None, None)
            .unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let created = storage
            .create_work_item(
                project.id,
                NewWorkItem {
                    start_date: Some(start),
                    duration: Some(4),
                    ..NewWorkItem::titled("Survey")
                },
            )
            .unwrap();
        assert_eq!(created.end_date, NaiveDate::from_ymd_opt(2026, 3, 6));

        let bad = storage.create_work_item(
            project.id,
            NewWorkItem {
                start_date: Some(start),
                end_date: NaiveDate::from_ymd_opt(2026, 3, 1),
                ..NewWorkItem::titled("Backwards")
            },
        );
        assert!(matches!(bad, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_huge_duration_rejected() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = storage
            .create_project("Dam", Methodology::Waterfall, None, None)
            .unwrap();
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let result = storage.create_work_item(
            project.id,
            NewWorkItem {
                start_date: Some(start),
                duration: Some(1_000_000_000),
                ..NewWorkItem::titled("Forever")
            },
        );

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(storage.list_work_items(project.id, true).unwrap().is_empty());
    }

    #[test]
    fn test_closed_sprint_takes_no_new_items() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        let project_id = board.project.id;
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let closed = sprints::insert_sprint(storage.conn(), project_id, None, None, None).unwrap();
        sprints::mark_active(storage.conn(), project_id, closed.id, day, day).unwrap();
        sprints::mark_closed(storage.conn(), project_id, closed.id).unwrap();
        let kept = storage
            .create_work_item(project_id, NewWorkItem::titled("Kept"))
            .unwrap();
        storage
            .conn()
            .execute(
                "UPDATE work_items SET sprint_id = ?1 WHERE project_id = ?2 AND number = ?3",
                params![closed.id, project_id, kept.number],
            )
            .unwrap();

        let created = storage.create_work_item(
            project_id,
            NewWorkItem {
                sprint_id: Some(closed.id),
                ..NewWorkItem::titled("Late")
            },
        );
        assert!(matches!(created, Err(Error::Precondition(_))));

        let other = item(&mut storage, project_id, "Other");
        let mut other = storage.get_work_item(project_id, other).unwrap();
        other.sprint_id = Some(closed.id);
        let moved = storage.update_work_item(&other);
        assert!(matches!(moved, Err(Error::Precondition(_))));

        // Items already in the closed sprint stay editable
        let mut kept = storage.get_work_item(project_id, kept.number).unwrap();
        kept.title = "Kept (renamed)".to_string();
        let renamed = storage.update_work_item(&kept).unwrap();
        assert_eq!(renamed.sprint_id, Some(closed.id));
    }

    #[test]
    fn test_create_under_parent_appends_child() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = storage
            .create_project("Dam", Methodology::Waterfall, None, None)
            .unwrap();
        let parent = item(&mut storage, project.id, "Civil works");
        item(&mut storage, project.id, "Electrical");
        let child = storage
            .create_work_item(
                project.id,
                NewWorkItem {
                    parent: Some(parent),
                    ..NewWorkItem::titled("Excavation")
                },
            )
            .unwrap();

        assert_eq!(child.parent_number, Some(parent));
        assert_eq!(child.outline_level, 2);
        assert_eq!(child.wbs_index, "1.1");
        assert_eq!(storage.get_work_item(project.id, 2).unwrap().wbs_index, "2");
    }

    #[test]
    fn test_archive_repacks_column() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        let a = item(&mut storage, board.project.id, "A");
        let b = item(&mut storage, board.project.id, "B");

        storage.archive_work_item(board.project.id, a).unwrap();

        let b = storage.get_work_item(board.project.id, b).unwrap();
        assert_eq!(b.position, 0);
        assert_eq!(b.wbs_index, "1");
        assert_eq!(storage.list_work_items(board.project.id, false).unwrap().len(), 1);
        assert_eq!(storage.list_work_items(board.project.id, true).unwrap().len(), 2);
    }

    #[test]
    fn test_status_change_is_logged() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        let number = item(&mut storage, board.project.id, "Login");

        let mut work_item = storage.get_work_item(board.project.id, number).unwrap();
        work_item.status = "Done".to_string();
        storage.update_work_item(&work_item).unwrap();

        let log = storage.list_activity(board.project.id, Some(number)).unwrap();
        let last = log.last().unwrap();
        assert_eq!(last.action, "status_changed");
        assert_eq!(last.from_value.as_deref(), Some("Backlog"));
        assert_eq!(last.to_value.as_deref(), Some("Done"));
    }

    #[test]
    fn test_checklist_lifecycle() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        let number = item(&mut storage, board.project.id, "Login");

        let dod = storage
            .add_checklist_item(board.project.id, number, ChecklistKind::Dod, "Tests pass")
            .unwrap();
        storage
            .add_checklist_item(board.project.id, number, ChecklistKind::Dor, "Designed")
            .unwrap();

        assert_eq!(
            count_unchecked_dod(storage.conn(), board.project.id, number).unwrap(),
            1
        );
        storage
            .set_checklist_checked(board.project.id, dod.id, true)
            .unwrap();
        assert_eq!(
            count_unchecked_dod(storage.conn(), board.project.id, number).unwrap(),
            0
        );
        assert_eq!(storage.list_checklist(board.project.id, number).unwrap().len(), 2);
    }

    #[test]
    fn test_checklist_scoped_to_project() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        let number = item(&mut storage, board.project.id, "Login");
        let dod = storage
            .add_checklist_item(board.project.id, number, ChecklistKind::Dod, "Reviewed")
            .unwrap();
        let other = storage
            .create_project("Gemini", Methodology::Agile, None, None)
            .unwrap();

        let err = storage.set_checklist_checked(other.id, dod.id, true).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_items_visible_from_second_connection() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let board = seed_board(&mut storage, Methodology::Agile);
        item(&mut storage, board.project.id, "Login");

        let second: Storage = env.open_storage();
        assert_eq!(second.list_work_items(board.project.id, false).unwrap().len(), 1);
    }
}
