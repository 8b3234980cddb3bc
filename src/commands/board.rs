//! Workflow gate: guarded column moves.
//!
//! A move is evaluated and applied inside one immediate transaction. Both
//! guards (WIP capacity, Definition of Done) read committed state after the
//! write lock is taken, so two concurrent moves into the same limited column
//! cannot both observe spare capacity.

use serde::Serialize;

use super::{Output, json};
use crate::models::WorkItem;
use crate::storage::{Storage, items, projects};
use crate::{Error, Result};

/// Outcome of a successful move.
#[derive(Debug, Serialize)]
pub struct MoveResult {
    pub item: WorkItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_column: Option<String>,
    pub to_column: String,
    /// False when the move only reordered within the same column
    pub column_changed: bool,
}

impl Output for MoveResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.column_changed {
            format!(
                "Moved #{} from {} to {} (position {})",
                self.item.number,
                self.from_column.as_deref().unwrap_or("(no column)"),
                self.to_column,
                self.item.position
            )
        } else {
            format!(
                "Reordered #{} within {} (position {})",
                self.item.number, self.to_column, self.item.position
            )
        }
    }
}

/// Move a work item into `target_column` at `target_position`.
///
/// Positions past the end of the column append. Fails without side effects
/// when the target column is at its WIP limit (column changes only) or when
/// the target is a DONE column and a Definition of Done entry is unchecked.
pub fn attempt_move(
    storage: &mut Storage,
    project_id: i64,
    number: i64,
    target_column: i64,
    target_position: i64,
) -> Result<MoveResult> {
    if target_position < 0 {
        return Err(Error::InvalidInput(format!(
            "Target position must be zero or greater, got {}",
            target_position
        )));
    }

    storage.immediate(|tx| {
        let item = items::get_live_work_item(tx, project_id, number)?;
        let target = projects::get_column(tx, project_id, target_column)?;
        let column_changed = item.column_id != Some(target.id);

        if column_changed && let Some(limit) = target.wip_limit {
            let occupied = items::count_in_column(tx, project_id, target.id)?;
            if occupied >= limit {
                tracing::warn!(
                    project_id,
                    number,
                    column = %target.name,
                    limit,
                    "move rejected: WIP limit reached"
                );
                return Err(Error::WipLimitReached {
                    column: target.name.clone(),
                    limit,
                });
            }
        }

        if target.col_type.is_terminal() {
            let incomplete = items::count_unchecked_dod(tx, project_id, number)?;
            if incomplete > 0 {
                tracing::warn!(
                    project_id,
                    number,
                    incomplete,
                    "move rejected: Definition of Done incomplete"
                );
                return Err(Error::DefinitionOfDoneIncomplete { incomplete });
            }
        }

        let from_column = match item.column_id {
            Some(id) => Some(projects::get_column(tx, project_id, id)?),
            None => None,
        };

        let mut target_order = items::column_order(tx, project_id, target.id)?;
        target_order.retain(|n| *n != number);
        let index = usize::try_from(target_position)
            .unwrap_or(usize::MAX)
            .min(target_order.len());
        target_order.insert(index, number);

        if column_changed && let Some(source) = &from_column {
            let mut source_order = items::column_order(tx, project_id, source.id)?;
            source_order.retain(|n| *n != number);
            items::write_column_order(tx, project_id, source.id, &source_order)?;
        }
        items::write_column_order(tx, project_id, target.id, &target_order)?;

        if column_changed {
            items::insert_activity(
                tx,
                project_id,
                number,
                "moved",
                from_column.as_ref().map(|c| c.name.as_str()),
                Some(&target.name),
            )?;
            tracing::info!(
                project_id,
                number,
                from = from_column.as_ref().map(|c| c.name.as_str()).unwrap_or("-"),
                to = %target.name,
                position = index,
                "work item moved"
            );
        } else {
            tracing::debug!(project_id, number, position = index, "work item reordered");
        }

        Ok(MoveResult {
            item: items::get_work_item(tx, project_id, number)?,
            from_column: from_column.map(|c| c.name),
            to_column: target.name,
            column_changed,
        })
    })
}
