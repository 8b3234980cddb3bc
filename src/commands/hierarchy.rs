//! WBS indent, outdent, and reparent.
//!
//! Every edit reloads the outline tree from committed rows, applies the
//! structural change, then rewrites the derived level, position, and WBS
//! index of whatever rows moved.

use rusqlite::Transaction;
use serde::Serialize;

use super::{Listing, Output, json};
use crate::models::WorkItem;
use crate::models::outline::Outline;
use crate::storage::{Storage, items, projects};
use crate::Result;

/// An item after a hierarchy edit, plus every row whose outline data changed.
#[derive(Debug, Serialize)]
pub struct HierarchyChange {
    pub item: WorkItem,
    pub renumbered: Vec<i64>,
}

impl Output for HierarchyChange {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let parent = self
            .item
            .parent_number
            .map(|p| format!("under #{}", p))
            .unwrap_or_else(|| "at root".to_string());
        format!(
            "#{} is now {} (level {}, {}); {} row(s) renumbered",
            self.item.number,
            self.item.wbs_index,
            self.item.outline_level,
            parent,
            self.renumbered.len()
        )
    }
}

/// Apply `edit` to the project outline and persist the result.
fn edit_outline(
    storage: &mut Storage,
    project_id: i64,
    number: i64,
    action: &str,
    edit: impl FnOnce(&mut Outline) -> Result<()>,
) -> Result<HierarchyChange> {
    storage.immediate(|tx: &Transaction<'_>| {
        projects::get_project(tx, project_id)?;
        let before = items::get_live_work_item(tx, project_id, number)?;

        let mut outline = items::load_outline(tx, project_id)?;
        edit(&mut outline)?;
        let renumbered = items::write_outline(tx, project_id, &outline)?;

        let item = items::get_work_item(tx, project_id, number)?;
        items::insert_activity(
            tx,
            project_id,
            number,
            action,
            Some(&before.wbs_index),
            Some(&item.wbs_index),
        )?;
        tracing::info!(
            project_id,
            item = number,
            action,
            from = %before.wbs_index,
            to = %item.wbs_index,
            renumbered = renumbered.len(),
            "outline changed"
        );
        Ok(HierarchyChange { item, renumbered })
    })
}

/// Nest a task under its immediately preceding sibling.
pub fn indent(storage: &mut Storage, project_id: i64, number: i64) -> Result<HierarchyChange> {
    edit_outline(storage, project_id, number, "indented", |outline| {
        outline.indent(number).map(|_| ())
    })
    .inspect_err(|e| tracing::warn!(project_id, item = number, error = %e, "indent rejected"))
}

/// Move a task up one level, right after its former parent.
pub fn outdent(storage: &mut Storage, project_id: i64, number: i64) -> Result<HierarchyChange> {
    edit_outline(storage, project_id, number, "outdented", |outline| {
        outline.outdent(number).map(|_| ())
    })
    .inspect_err(|e| tracing::warn!(project_id, item = number, error = %e, "outdent rejected"))
}

/// Move a task and its subtree to be the last child of `new_parent`, or the last root.
pub fn reparent(
    storage: &mut Storage,
    project_id: i64,
    number: i64,
    new_parent: Option<i64>,
) -> Result<HierarchyChange> {
    edit_outline(storage, project_id, number, "reparented", |outline| {
        outline.reparent(number, new_parent)
    })
    .inspect_err(|e| tracing::warn!(project_id, item = number, error = %e, "reparent rejected"))
}

/// Non-archived items in WBS order.
pub fn outline(storage: &Storage, project_id: i64) -> Result<Listing<WorkItem>> {
    projects::get_project(storage.conn(), project_id)?;
    Ok(items::list_work_items(storage.conn(), project_id, false)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Methodology;
    use crate::test_utils::{TestEnv, item};
    use crate::{Error, ErrorKind};

    fn wbs(storage: &Storage, project_id: i64) -> Vec<(i64, String, u32, Option<i64>)> {
        outline(storage, project_id)
            .unwrap()
            .items
            .into_iter()
            .map(|i| (i.number, i.wbs_index, i.outline_level, i.parent_number))
            .collect()
    }

    fn waterfall(storage: &mut Storage) -> i64 {
        storage
            .create_project("Dam", Methodology::Waterfall, None, None)
            .unwrap()
            .id
    }

    #[test]
    fn test_indent_under_preceding_sibling() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        let a = item(&mut storage, project, "Design");
        let b = item(&mut storage, project, "Drawings");
        let c = item(&mut storage, project, "Build");

        let change = indent(&mut storage, project, b).unwrap();

        assert_eq!(change.item.parent_number, Some(a));
        assert_eq!(change.item.outline_level, 2);
        assert_eq!(change.item.wbs_index, "1.1");
        assert_eq!(
            wbs(&storage, project),
            vec![
                (a, "1".to_string(), 1, None),
                (b, "1.1".to_string(), 2, Some(a)),
                (c, "2".to_string(), 1, None),
            ]
        );
    }

    #[test]
    fn test_indent_first_sibling_rejected() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        let a = item(&mut storage, project, "Design");

        let err = indent(&mut storage, project, a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(wbs(&storage, project), vec![(a, "1".to_string(), 1, None)]);
    }

    #[test]
    fn test_outdent_root_rejected() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        let a = item(&mut storage, project, "Design");

        let err = outdent(&mut storage, project, a).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_outdent_lands_after_former_parent() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        let a = item(&mut storage, project, "Design");
        let b = item(&mut storage, project, "Drawings");
        let c = item(&mut storage, project, "Review");
        let d = item(&mut storage, project, "Build");
        indent(&mut storage, project, b).unwrap();
        indent(&mut storage, project, c).unwrap();

        let change = outdent(&mut storage, project, b).unwrap();

        assert_eq!(change.item.parent_number, None);
        assert_eq!(change.item.wbs_index, "2");
        assert_eq!(
            wbs(&storage, project),
            vec![
                (a, "1".to_string(), 1, None),
                (c, "1.1".to_string(), 2, Some(a)),
                (b, "2".to_string(), 1, None),
                (d, "3".to_string(), 1, None),
            ]
        );
        assert!(change.renumbered.contains(&d));
    }

    #[test]
    fn test_subtree_levels_follow_parent() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        let a = item(&mut storage, project, "Design");
        let b = item(&mut storage, project, "Drawings");
        let c = item(&mut storage, project, "Sheet 1");
        indent(&mut storage, project, b).unwrap();
        indent(&mut storage, project, c).unwrap();
        indent(&mut storage, project, c).unwrap();

        let rows = wbs(&storage, project);
        assert_eq!(rows[2], (c, "1.1.1".to_string(), 3, Some(b)));

        // Every non-root row sits one level below its parent
        for (_, _, level, parent) in &rows {
            if let Some(parent) = parent {
                let parent_level = rows.iter().find(|r| r.0 == *parent).unwrap().2;
                assert_eq!(*level, parent_level + 1);
            } else {
                assert_eq!(*level, 1);
            }
        }

        outdent(&mut storage, project, b).unwrap();
        let rows = wbs(&storage, project);
        assert_eq!(rows[1], (b, "2".to_string(), 1, None));
        assert_eq!(rows[2], (c, "2.1".to_string(), 2, Some(b)));
        assert_eq!(rows[0].0, a);
    }

    #[test]
    fn test_reparent_rejects_own_descendant() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        let a = item(&mut storage, project, "Design");
        let b = item(&mut storage, project, "Drawings");
        indent(&mut storage, project, b).unwrap();

        let err = reparent(&mut storage, project, a, Some(b)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let change = reparent(&mut storage, project, b, None).unwrap();
        assert_eq!(change.item.wbs_index, "2");
        assert_eq!(change.item.outline_level, 1);
    }

    #[test]
    fn test_hierarchy_edits_are_logged() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        item(&mut storage, project, "Design");
        let b = item(&mut storage, project, "Drawings");
        indent(&mut storage, project, b).unwrap();
        outdent(&mut storage, project, b).unwrap();

        let log: Vec<_> = storage
            .list_activity(project, Some(b))
            .unwrap()
            .into_iter()
            .map(|a| (a.action, a.from_value, a.to_value))
            .collect();
        assert_eq!(
            &log[1..],
            &[
                (
                    "indented".to_string(),
                    Some("2".to_string()),
                    Some("1.1".to_string())
                ),
                (
                    "outdented".to_string(),
                    Some("1.1".to_string()),
                    Some("2".to_string())
                ),
            ]
        );
    }

    #[test]
    fn test_archived_item_cannot_be_indented() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let project = waterfall(&mut storage);
        item(&mut storage, project, "Design");
        let b = item(&mut storage, project, "Drawings");
        storage.archive_work_item(project, b).unwrap();

        let err = indent(&mut storage, project, b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
