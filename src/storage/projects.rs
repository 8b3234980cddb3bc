//! Project and board column rows.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{BoardColumn, ColumnType, Methodology, Project};
use crate::{Error, Result};

const PROJECT_COLUMNS: &str =
    "id, name, methodology, done_status, default_start, sprint_count, created_at";

const COLUMN_COLUMNS: &str =
    "id, project_id, name, col_type, board_type, wip_limit, position, created_at";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        methodology: row.get("methodology")?,
        done_status: row.get("done_status")?,
        default_start: row.get("default_start")?,
        sprint_count: row.get("sprint_count")?,
        created_at: row.get("created_at")?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<BoardColumn> {
    Ok(BoardColumn {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        col_type: row.get("col_type")?,
        board_type: row.get("board_type")?,
        wip_limit: row.get("wip_limit")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
    })
}

pub fn insert_project(
    conn: &Connection,
    name: &str,
    methodology: Methodology,
    done_status: Option<&str>,
    default_start: Option<NaiveDate>,
) -> Result<Project> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Project name cannot be empty".to_string()));
    }
    let done_status = done_status.map(str::trim).unwrap_or("Done");
    if done_status.is_empty() {
        return Err(Error::InvalidInput("Done status label cannot be empty".to_string()));
    }

    conn.execute(
        "INSERT INTO projects (name, methodology, done_status, default_start, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, methodology, done_status, default_start, Utc::now()],
    )?;
    get_project(conn, conn.last_insert_rowid())
}

pub fn get_project(conn: &Connection, id: i64) -> Result<Project> {
    conn.query_row(
        &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
        [id],
        project_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Project {} not found", id)))
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM projects ORDER BY id",
        PROJECT_COLUMNS
    ))?;
    let projects = stmt
        .query_map([], project_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

/// Bump and return the project's sprint counter.
pub fn next_sprint_count(conn: &Connection, project_id: i64) -> Result<u32> {
    conn.execute(
        "UPDATE projects SET sprint_count = sprint_count + 1 WHERE id = ?1",
        [project_id],
    )?;
    Ok(get_project(conn, project_id)?.sprint_count)
}

/// Bump and return the project's work item sequence.
pub fn next_item_number(conn: &Connection, project_id: i64) -> Result<i64> {
    let updated = conn.execute(
        "UPDATE projects SET item_seq = item_seq + 1 WHERE id = ?1",
        [project_id],
    )?;
    if updated == 0 {
        return Err(Error::NotFound(format!("Project {} not found", project_id)));
    }
    let seq = conn.query_row(
        "SELECT item_seq FROM projects WHERE id = ?1",
        [project_id],
        |row| row.get(0),
    )?;
    Ok(seq)
}

pub fn insert_column(
    conn: &Connection,
    project_id: i64,
    name: &str,
    col_type: ColumnType,
    board_type: &str,
    wip_limit: Option<u32>,
) -> Result<BoardColumn> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Column name cannot be empty".to_string()));
    }
    if wip_limit == Some(0) {
        return Err(Error::InvalidInput(
            "WIP limit must be a positive integer".to_string(),
        ));
    }

    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM board_columns WHERE project_id = ?1",
        [project_id],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO board_columns
            (project_id, name, col_type, board_type, wip_limit, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            project_id,
            name.trim(),
            col_type,
            board_type,
            wip_limit,
            position,
            Utc::now()
        ],
    )?;
    get_column(conn, project_id, conn.last_insert_rowid())
}

/// Fetch a column, scoped to the project.
pub fn get_column(conn: &Connection, project_id: i64, id: i64) -> Result<BoardColumn> {
    conn.query_row(
        &format!(
            "SELECT {} FROM board_columns WHERE project_id = ?1 AND id = ?2",
            COLUMN_COLUMNS
        ),
        params![project_id, id],
        column_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("Column {} not found", id)))
}

pub fn list_columns(
    conn: &Connection,
    project_id: i64,
    board_type: Option<&str>,
) -> Result<Vec<BoardColumn>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM board_columns
         WHERE project_id = ?1 AND (?2 IS NULL OR board_type = ?2)
         ORDER BY position, id",
        COLUMN_COLUMNS
    ))?;
    let columns = stmt
        .query_map(params![project_id, board_type], column_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Column new work items land in: the first BACKLOG lane, else the first lane.
pub fn default_column(conn: &Connection, project_id: i64) -> Result<Option<BoardColumn>> {
    let columns = list_columns(conn, project_id, None)?;
    let backlog = columns
        .iter()
        .position(|c| c.col_type == ColumnType::Backlog)
        .unwrap_or(0);
    Ok(columns.into_iter().nth(backlog))
}
