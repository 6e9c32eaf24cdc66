//! Internal membership store interface.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::ids::{GroupKey, ProfileId};
use crate::member::MemberSet;

/// Authoritative store of group memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Fetch the current members of a group.
    ///
    /// An unknown group has no members.
    async fn fetch_members(&self, group: &GroupKey) -> StorageResult<MemberSet>;

    /// Open an atomic scope.
    ///
    /// Operations issued through the returned transaction become visible
    /// together on [`MembershipTransaction::commit`] or not at all.
    async fn begin(&self) -> StorageResult<Box<dyn MembershipTransaction>>;
}

/// An open atomic scope against a [`MembershipStore`].
///
/// Dropping a transaction without committing must discard every operation
/// issued through it, so a cancelled caller never leaves partial state behind.
#[async_trait]
pub trait MembershipTransaction: Send {
    /// Add `member` to `group`.
    async fn add_member(&mut self, group: &GroupKey, member: &ProfileId) -> StorageResult<()>;

    /// Remove `member` from `group`.
    async fn remove_member(&mut self, group: &GroupKey, member: &ProfileId) -> StorageResult<()>;

    /// Delete the group record itself.
    ///
    /// The group must have no members left in this scope. An unknown group is
    /// `NotFound`.
    async fn delete_group(&mut self, group: &GroupKey) -> StorageResult<()>;

    /// Make every operation in this scope visible.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discard every operation in this scope.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
