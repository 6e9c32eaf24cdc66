//! External profile service interface.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncResult;
use crate::ids::ProfileId;

/// Read/write access to a single attribute of an external profile.
///
/// No version token is exchanged: a write replaces the attribute wholesale and
/// silently overwrites anything written since the matching fetch.
#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Fetch the raw value of `attribute` on `profile_id`.
    ///
    /// Returns `Ok(None)` when the profile exists but the attribute is unset or
    /// null. A missing profile is a
    /// [`SyncError::ProfileFetch`](crate::SyncError::ProfileFetch).
    async fn fetch_attribute(
        &self,
        profile_id: &ProfileId,
        attribute: &str,
    ) -> SyncResult<Option<Value>>;

    /// Replace `attribute` on `profile_id` with `values`.
    async fn write_attribute(
        &self,
        profile_id: &ProfileId,
        attribute: &str,
        values: &[String],
    ) -> SyncResult<()>;
}
