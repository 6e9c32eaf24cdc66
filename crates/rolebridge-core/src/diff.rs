//! Membership diff engine.
//!
//! Full-replace semantics: the desired set supersedes the current set, so an
//! empty desired set empties the group.

use std::collections::HashSet;

use crate::ids::ProfileId;
use crate::member::MemberSet;

/// The minimal change set that moves `current` to `desired`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Members present in desired but absent from current.
    pub to_add: MemberSet,
    /// Ids present in current but absent from desired.
    pub to_remove: HashSet<ProfileId>,
}

impl MembershipDiff {
    /// Whether the diff contains no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Total number of add and remove operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }

    /// Ids to add, sorted.
    #[must_use]
    pub fn added_ids(&self) -> Vec<ProfileId> {
        self.to_add.sorted_ids()
    }

    /// Ids to remove, sorted.
    #[must_use]
    pub fn removed_ids(&self) -> Vec<ProfileId> {
        let mut ids: Vec<ProfileId> = self.to_remove.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Id set after applying this diff to `current`.
    #[must_use]
    pub fn resulting_ids(&self, current: &MemberSet) -> HashSet<ProfileId> {
        current
            .ids()
            .filter(|id| !self.to_remove.contains(*id))
            .chain(self.to_add.ids())
            .cloned()
            .collect()
    }
}

/// Compute the diff between the current and desired member sets.
#[must_use]
pub fn diff(current: &MemberSet, desired: &MemberSet) -> MembershipDiff {
    let to_add: MemberSet = desired
        .iter()
        .filter(|m| !current.contains(m.id.as_str()))
        .cloned()
        .collect();

    let to_remove = current
        .ids()
        .filter(|id| !desired.contains(id.as_str()))
        .cloned()
        .collect();

    MembershipDiff { to_add, to_remove }
}
