//! Directory records: employees and the groups they can belong to.
//!
//! Membership itself goes through [`MembershipStore`](crate::MembershipStore);
//! this interface owns the rows memberships point at. An employee must exist
//! before it can be added to a group.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::ids::{GroupKey, ProfileId};

/// A directory employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Profile id issued by the identity provider.
    pub id: ProfileId,
    /// Full name.
    pub name: String,
    /// Primary email, also the SCIM `userName`.
    pub email: String,
    /// Inactive employees keep their rows and memberships.
    pub active: bool,
}

impl Employee {
    /// Create an active employee.
    pub fn new(id: impl Into<ProfileId>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            active: true,
        }
    }
}

/// A stored group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Group name, the key memberships use.
    pub name: GroupKey,
    /// Id the identity provider knows the group by, once bound.
    pub external_id: Option<String>,
}

/// Window into an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    /// Default page size for listings.
    pub const DEFAULT_LIMIT: u32 = 100;

    /// Build a page from a 1-based start index and a count.
    ///
    /// Zero values fall back to the first item and the default size.
    #[must_use]
    pub fn from_start_index(start_index: u32, count: u32) -> Self {
        Self {
            offset: start_index.max(1) - 1,
            limit: if count == 0 { Self::DEFAULT_LIMIT } else { count },
        }
    }

    /// 1-based index of the first item.
    #[must_use]
    pub fn start_index(&self) -> u32 {
        self.offset + 1
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::from_start_index(1, Self::DEFAULT_LIMIT)
    }
}

/// Store of employee and group records.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Insert an employee or overwrite the one with the same id.
    async fn upsert_employee(&self, employee: &Employee) -> StorageResult<Employee>;

    async fn get_employee(&self, id: &ProfileId) -> StorageResult<Option<Employee>>;

    /// Look an employee up by email, active or not.
    async fn find_employee_by_email(&self, email: &str) -> StorageResult<Option<Employee>>;

    /// Employees ordered by id.
    async fn list_employees(&self, page: Page) -> StorageResult<Vec<Employee>>;

    /// Mark an employee inactive. Unknown ids are `NotFound`.
    async fn deactivate_employee(&self, id: &ProfileId) -> StorageResult<()>;

    /// Create a group. An existing name is a `Conflict`.
    async fn create_group(&self, group: &GroupKey, external_id: &str) -> StorageResult<GroupRecord>;

    /// Record the external id of a group, creating the group if needed.
    async fn bind_group(&self, group: &GroupKey, external_id: &str) -> StorageResult<GroupRecord>;

    async fn find_group(&self, external_id: &str) -> StorageResult<Option<GroupRecord>>;

    async fn find_group_by_name(&self, group: &GroupKey) -> StorageResult<Option<GroupRecord>>;

    /// Groups ordered by name.
    async fn list_groups(&self, page: Page) -> StorageResult<Vec<GroupRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_from_start_index() {
        assert_eq!(
            Page::from_start_index(1, 25),
            Page {
                offset: 0,
                limit: 25
            }
        );
        assert_eq!(Page::from_start_index(11, 10).offset, 10);
        assert_eq!(Page::from_start_index(11, 10).start_index(), 11);
    }

    #[test]
    fn test_page_zero_values_use_defaults() {
        let page = Page::from_start_index(0, 0);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, Page::DEFAULT_LIMIT);
    }
}
