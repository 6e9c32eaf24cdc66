//! Group members and member sets.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::{self, HashMap};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::ids::ProfileId;

/// A member of a group.
///
/// Two members are equal when their ids match; `display` is metadata only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Directory identifier of the member.
    pub id: ProfileId,
    /// Human-readable label (usually the member's email).
    pub display: String,
}

impl Member {
    /// Create a new member.
    pub fn new(id: impl Into<ProfileId>, display: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display: display.into(),
        }
    }

    /// Whether both `id` and `display` are non-empty.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && !self.display.is_empty()
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A set of members keyed by id.
///
/// Construction keeps the first occurrence of a duplicated id and silently
/// discards the later ones. No iteration order is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSet {
    members: HashMap<ProfileId, Member>,
}

impl MemberSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a desired-state member list.
    ///
    /// Entries with an empty id or an empty display are not considered for
    /// membership at all.
    pub fn from_requested<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Member>,
    {
        let mut set = Self::new();
        for member in members {
            if member.is_well_formed() {
                set.insert(member);
            } else {
                tracing::debug!(member_id = %member.id, "Skipping malformed member entry");
            }
        }
        set
    }

    /// Build a set from observed state.
    ///
    /// Only entries without an id are dropped; a missing display does not hide
    /// a stored membership.
    pub fn from_members<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Member>,
    {
        let mut set = Self::new();
        for member in members.into_iter().filter(|m| !m.id.is_empty()) {
            set.insert(member);
        }
        set
    }

    /// Insert a member unless its id is already present.
    ///
    /// Returns `true` if the member was added.
    pub fn insert(&mut self, member: Member) -> bool {
        match self.members.entry(member.id.clone()) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(slot) => {
                slot.insert(member);
                true
            }
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a member with this id is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Look up a member by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.get(id)
    }

    /// Iterate over the members.
    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Iterate over the member ids.
    pub fn ids(&self) -> impl Iterator<Item = &ProfileId> {
        self.members.keys()
    }

    /// Collect the member ids into a set.
    #[must_use]
    pub fn id_set(&self) -> HashSet<ProfileId> {
        self.members.keys().cloned().collect()
    }

    /// Member ids in ascending order, for stable logs and responses.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<ProfileId> {
        let mut ids: Vec<ProfileId> = self.members.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl FromIterator<Member> for MemberSet {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        Self::from_members(iter)
    }
}

impl IntoIterator for MemberSet {
    type Item = Member;
    type IntoIter = hash_map::IntoValues<ProfileId, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_values()
    }
}
