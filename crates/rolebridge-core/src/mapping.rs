//! Group-to-role mapping.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

use crate::ids::GroupKey;

/// Error returned when a textual mapping cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingParseError {
    #[error("mapping entry '{0}' is not of the form group=role")]
    MalformedEntry(String),

    #[error("group '{0}' is mapped more than once")]
    DuplicateGroup(String),
}

/// Maps internal groups to the external role they grant.
///
/// Groups without an entry have no external counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMapping {
    roles: HashMap<GroupKey, String>,
}

impl RoleMapping {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from `(group, role)` pairs. Later pairs win.
    pub fn from_pairs<I, G, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (G, R)>,
        G: Into<GroupKey>,
        R: Into<String>,
    {
        Self {
            roles: pairs
                .into_iter()
                .map(|(g, r)| (g.into(), r.into()))
                .collect(),
        }
    }

    /// Parse `group=role` pairs separated by commas.
    ///
    /// Whitespace around entries is ignored, as are empty entries, so a blank
    /// string yields an empty mapping.
    pub fn parse(input: &str) -> Result<Self, MappingParseError> {
        let mut roles = HashMap::new();
        for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (group, role) = entry
                .split_once('=')
                .map(|(g, r)| (g.trim(), r.trim()))
                .filter(|(g, r)| !g.is_empty() && !r.is_empty())
                .ok_or_else(|| MappingParseError::MalformedEntry(entry.to_string()))?;

            if roles
                .insert(GroupKey::new(group), role.to_string())
                .is_some()
            {
                return Err(MappingParseError::DuplicateGroup(group.to_string()));
            }
        }
        Ok(Self { roles })
    }

    /// Role granted by membership in `group`, if any.
    #[must_use]
    pub fn role_for(&self, group: &GroupKey) -> Option<&str> {
        self.roles.get(group).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl FromStr for RoleMapping {
    type Err = MappingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
