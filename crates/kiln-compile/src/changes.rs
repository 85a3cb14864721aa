use crate::deps::ClassName;
use std::collections::BTreeSet;

/// Added, modified and removed class names driving one incremental pass.
///
/// Removal is authoritative: a name also listed as added or modified is
/// dropped from those sets on construction, so a class deleted from source
/// is never handed to the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    added: BTreeSet<ClassName>,
    modified: BTreeSet<ClassName>,
    removed: BTreeSet<ClassName>,
}

impl ChangeSet {
    pub fn new(
        added: BTreeSet<ClassName>,
        modified: BTreeSet<ClassName>,
        removed: BTreeSet<ClassName>,
    ) -> Self {
        let added = added.difference(&removed).cloned().collect();
        let modified = modified.difference(&removed).cloned().collect();
        Self {
            added,
            modified,
            removed,
        }
    }

    /// A change set treating every class in `classes` as modified: the
    /// shape of an externally forced or degradation-driven full rebuild.
    pub fn full_rebuild(classes: BTreeSet<ClassName>) -> Self {
        Self {
            added: BTreeSet::new(),
            modified: classes,
            removed: BTreeSet::new(),
        }
    }

    pub fn added(&self) -> &BTreeSet<ClassName> {
        &self.added
    }

    pub fn modified(&self) -> &BTreeSet<ClassName> {
        &self.modified
    }

    pub fn removed(&self) -> &BTreeSet<ClassName> {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Union of all three sets: every class whose previously compiled shape
    /// is no longer trustworthy.
    pub fn dirty_classes(&self) -> BTreeSet<ClassName> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<ClassName> {
        list.iter().copied().map(ClassName::from).collect()
    }

    #[test]
    fn removal_wins_over_added_and_modified() {
        let changes = ChangeSet::new(names(&["A", "B"]), names(&["B", "C"]), names(&["B"]));

        assert_eq!(*changes.added(), names(&["A"]));
        assert_eq!(*changes.modified(), names(&["C"]));
        assert_eq!(*changes.removed(), names(&["B"]));
    }

    #[test]
    fn dirty_classes_is_the_union() {
        let changes = ChangeSet::new(names(&["A"]), names(&["B"]), names(&["C"]));
        assert_eq!(changes.dirty_classes(), names(&["A", "B", "C"]));
    }
}
