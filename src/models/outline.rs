//! Work Breakdown Structure outline.
//!
//! The outline is an explicit tree (parent map plus ordered child lists)
//! rebuilt from storage on every hierarchy edit. Levels, flat positions,
//! and dotted WBS indexes are derived from the tree by [`Outline::entries`]
//! and never maintained independently.

use std::collections::{HashMap, HashSet};

use crate::{Error, Result};

/// Derived outline data for one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub number: i64,
    pub parent: Option<i64>,
    pub level: u32,
    pub position: i64,
    pub wbs_index: String,
}

/// Ordered WBS tree keyed by work item number.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    /// Child lists in display order; roots live under `None`
    children: HashMap<Option<i64>, Vec<i64>>,
    parent: HashMap<i64, Option<i64>>,
}

impl Outline {
    /// Build an outline from `(number, parent)` rows in flat display order.
    ///
    /// Parents that are not among the rows (archived or foreign) are treated
    /// as absent, making the row a root. Rows unreachable from any root
    /// (corrupted parent loops) are re-attached as trailing roots.
    pub fn from_rows(rows: impl IntoIterator<Item = (i64, Option<i64>)>) -> Self {
        let rows: Vec<(i64, Option<i64>)> = rows.into_iter().collect();
        let known: HashSet<i64> = rows.iter().map(|(n, _)| *n).collect();

        let mut outline = Self::default();
        for (number, parent) in &rows {
            let parent = parent.filter(|p| known.contains(p) && p != number);
            outline.parent.insert(*number, parent);
            outline.children.entry(parent).or_default().push(*number);
        }

        let reachable: HashSet<i64> = outline.preorder().into_iter().map(|(n, _)| n).collect();
        for (number, _) in &rows {
            if !reachable.contains(number) {
                outline.detach(*number);
                outline.parent.insert(*number, None);
                outline.children.entry(None).or_default().push(*number);
            }
        }

        outline
    }

    pub fn contains(&self, number: i64) -> bool {
        self.parent.contains_key(&number)
    }

    pub fn parent_of(&self, number: i64) -> Option<i64> {
        self.parent.get(&number).copied().flatten()
    }

    pub fn children_of(&self, number: Option<i64>) -> &[i64] {
        self.children
            .get(&number)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns true if `number` lies somewhere below `ancestor`.
    pub fn is_descendant(&self, number: i64, ancestor: i64) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.parent_of(number);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            if !seen.insert(p) {
                return false;
            }
            current = self.parent_of(p);
        }
        false
    }

    /// Make `number` the last child of its immediately preceding sibling.
    pub fn indent(&mut self, number: i64) -> Result<i64> {
        self.require(number)?;
        let parent = self.parent_of(number);
        let siblings = self.children_of(parent);
        let index = siblings
            .iter()
            .position(|n| *n == number)
            .ok_or_else(|| Error::Other(format!("Outline is inconsistent for #{}", number)))?;

        if index == 0 {
            return Err(Error::Precondition(format!(
                "#{} has no preceding sibling to indent under",
                number
            )));
        }
        let new_parent = siblings[index - 1];

        self.detach(number);
        self.parent.insert(number, Some(new_parent));
        self.children.entry(Some(new_parent)).or_default().push(number);
        Ok(new_parent)
    }

    /// Move `number` up one level, directly after its former parent.
    pub fn outdent(&mut self, number: i64) -> Result<Option<i64>> {
        self.require(number)?;
        let Some(parent) = self.parent_of(number) else {
            return Err(Error::Precondition(format!(
                "#{} is already at the root level",
                number
            )));
        };
        let grandparent = self.parent_of(parent);

        self.detach(number);
        let siblings = self.children.entry(grandparent).or_default();
        let index = siblings
            .iter()
            .position(|n| *n == parent)
            .map(|i| i + 1)
            .unwrap_or(siblings.len());
        siblings.insert(index, number);
        self.parent.insert(number, grandparent);
        Ok(grandparent)
    }

    /// Move `number` (with its subtree) to be the last child of `new_parent`.
    pub fn reparent(&mut self, number: i64, new_parent: Option<i64>) -> Result<()> {
        self.require(number)?;
        if let Some(p) = new_parent {
            self.require(p)?;
            if p == number || self.is_descendant(p, number) {
                return Err(Error::Precondition(format!(
                    "Cannot move #{} under its own subtree (#{})",
                    number, p
                )));
            }
        }

        self.detach(number);
        self.parent.insert(number, new_parent);
        self.children.entry(new_parent).or_default().push(number);
        Ok(())
    }

    /// Derive level, flat position, and WBS index for every item.
    pub fn entries(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::with_capacity(self.parent.len());
        let mut stack: Vec<(i64, u32, String)> = Vec::new();

        let roots = self.children_of(None);
        for (i, root) in roots.iter().enumerate().rev() {
            stack.push((*root, 1, (i + 1).to_string()));
        }

        while let Some((number, level, wbs_index)) = stack.pop() {
            let kids = self.children_of(Some(number));
            for (i, child) in kids.iter().enumerate().rev() {
                stack.push((*child, level + 1, format!("{}.{}", wbs_index, i + 1)));
            }
            entries.push(OutlineEntry {
                number,
                parent: self.parent_of(number),
                level,
                position: entries.len() as i64,
                wbs_index,
            });
        }

        entries
    }

    fn preorder(&self) -> Vec<(i64, u32)> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<(i64, u32)> = self
            .children_of(None)
            .iter()
            .rev()
            .map(|n| (*n, 1))
            .collect();
        while let Some((number, level)) = stack.pop() {
            if !visited.insert(number) {
                continue;
            }
            out.push((number, level));
            for child in self.children_of(Some(number)).iter().rev() {
                stack.push((*child, level + 1));
            }
        }
        out
    }

    fn detach(&mut self, number: i64) {
        let parent = self.parent_of(number);
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|n| *n != number);
        }
    }

    fn require(&self, number: i64) -> Result<()> {
        if self.contains(number) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Work item #{} not found", number)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(numbers: &[i64]) -> Outline {
        Outline::from_rows(numbers.iter().map(|n| (*n, None)))
    }

    fn index_of(outline: &Outline, number: i64) -> String {
        outline
            .entries()
            .into_iter()
            .find(|e| e.number == number)
            .unwrap()
            .wbs_index
    }

    #[test]
    fn test_flat_outline_numbering() {
        let outline = flat(&[10, 11, 12]);
        let entries = outline.entries();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].wbs_index, "1");
        assert_eq!(entries[2].wbs_index, "3");
        assert!(entries.iter().all(|e| e.level == 1));
    }

    #[test]
    fn test_indent_under_preceding_sibling() {
        let mut outline = flat(&[1, 2, 3]);

        let parent = outline.indent(2).unwrap();
        assert_eq!(parent, 1);

        let entries = outline.entries();
        assert_eq!(entries[1].number, 2);
        assert_eq!(entries[1].level, 2);
        assert_eq!(entries[1].wbs_index, "1.1");
        assert_eq!(index_of(&outline, 3), "2");
    }

    #[test]
    fn test_indent_appends_after_existing_children() {
        // 1, 1.1 (=2), then 3 at root
        let mut outline = Outline::from_rows([(1, None), (2, Some(1)), (3, None)]);

        outline.indent(3).unwrap();
        assert_eq!(index_of(&outline, 3), "1.2");
        assert_eq!(outline.children_of(Some(1)), &[2, 3]);
    }

    #[test]
    fn test_indent_first_sibling_fails() {
        let mut outline = flat(&[1, 2]);
        let err = outline.indent(1).unwrap_err();
        assert!(err.to_string().contains("no preceding sibling"));
    }

    #[test]
    fn test_indent_carries_subtree() {
        let mut outline = Outline::from_rows([(1, None), (2, None), (3, Some(2))]);
        outline.indent(2).unwrap();

        let entries = outline.entries();
        let three = entries.iter().find(|e| e.number == 3).unwrap();
        assert_eq!(three.level, 3);
        assert_eq!(three.wbs_index, "1.1.1");
    }

    #[test]
    fn test_outdent_moves_after_former_parent() {
        let mut outline = Outline::from_rows([(1, None), (2, Some(1)), (3, Some(1)), (4, None)]);

        let new_parent = outline.outdent(2).unwrap();
        assert_eq!(new_parent, None);

        let order: Vec<i64> = outline.entries().iter().map(|e| e.number).collect();
        assert_eq!(order, vec![1, 3, 2, 4]);
        assert_eq!(index_of(&outline, 2), "2");
        assert_eq!(index_of(&outline, 3), "1.1");
        assert_eq!(index_of(&outline, 4), "3");
    }

    #[test]
    fn test_outdent_root_fails() {
        let mut outline = flat(&[1]);
        let err = outline.outdent(1).unwrap_err();
        assert!(err.to_string().contains("already at the root level"));
    }

    #[test]
    fn test_indent_then_outdent_restores_level() {
        let mut outline = flat(&[1, 2]);
        outline.indent(2).unwrap();
        outline.outdent(2).unwrap();

        let entries = outline.entries();
        assert!(entries.iter().all(|e| e.level == 1 && e.parent.is_none()));
        assert_eq!(index_of(&outline, 2), "2");
    }

    #[test]
    fn test_reparent_rejects_descendant() {
        let mut outline = Outline::from_rows([(1, None), (2, Some(1)), (3, Some(2))]);
        assert!(outline.reparent(1, Some(3)).is_err());
        assert!(outline.reparent(1, Some(1)).is_err());
        assert!(outline.reparent(3, None).is_ok());
        assert_eq!(index_of(&outline, 3), "2");
    }

    #[test]
    fn test_parent_levels_always_lower() {
        let mut outline = flat(&[1, 2, 3, 4]);
        outline.indent(2).unwrap();
        outline.indent(3).unwrap();
        outline.indent(3).unwrap();
        outline.outdent(2).ok();

        let entries = outline.entries();
        for entry in &entries {
            assert!(entry.level >= 1);
            if let Some(parent) = entry.parent {
                let parent_level = entries.iter().find(|e| e.number == parent).unwrap().level;
                assert!(parent_level < entry.level);
            }
        }
    }

    #[test]
    fn test_unknown_parent_becomes_root() {
        let outline = Outline::from_rows([(1, Some(99)), (2, Some(1))]);
        assert_eq!(outline.parent_of(1), None);
        assert_eq!(index_of(&outline, 2), "1.1");
    }

    #[test]
    fn test_parent_loop_is_reattached() {
        let outline = Outline::from_rows([(1, None), (2, Some(3)), (3, Some(2))]);
        assert_eq!(outline.entries().len(), 3);
    }
}
