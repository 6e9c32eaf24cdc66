//! Error types for reconciliation.
//!
//! Store errors abort a local apply and surface unchanged. Profile errors are
//! reported next to a successful local commit. Nothing here is retried
//! automatically; [`StorageError::is_transient`] and
//! [`SyncError::is_transient`] exist for callers that want a retry policy.

use thiserror::Error;

use crate::ids::ProfileId;

/// Error raised by the internal membership store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// A write collided with existing state (e.g. duplicate membership row).
    #[error("storage conflict: {message}")]
    Conflict { message: String },

    /// The store could not be reached or did not answer in time.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    /// The row or referenced record does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },
}

impl StorageError {
    /// Shorthand for [`StorageError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand for [`StorageError::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Shorthand for [`StorageError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Whether retrying the same request could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }

    /// Short, stable label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::Conflict { .. } => "conflict",
            StorageError::Unavailable { .. } => "unavailable",
            StorageError::NotFound { .. } => "not_found",
        }
    }
}

/// Error raised while synchronizing an external profile attribute.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The profile could not be fetched (including a missing profile).
    #[error("failed to fetch profile {profile_id}: {message}")]
    ProfileFetch {
        profile_id: ProfileId,
        message: String,
    },

    /// The attribute holds something other than a list of strings.
    #[error("attribute '{attribute}' on profile {profile_id} is malformed: {message}")]
    AttributeFormat {
        profile_id: ProfileId,
        attribute: String,
        message: String,
    },

    /// The updated attribute could not be written back.
    #[error("failed to persist profile {profile_id}: {message}")]
    ProfilePersist {
        profile_id: ProfileId,
        message: String,
    },
}

impl SyncError {
    /// Profile the error refers to.
    #[must_use]
    pub fn profile_id(&self) -> &ProfileId {
        match self {
            SyncError::ProfileFetch { profile_id, .. }
            | SyncError::AttributeFormat { profile_id, .. }
            | SyncError::ProfilePersist { profile_id, .. } => profile_id,
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// A malformed attribute stays malformed until someone fixes the profile.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, SyncError::AttributeFormat { .. })
    }
}

/// Error returned by the transactional applier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// A store operation failed; the transaction was rolled back.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The caller cancelled before commit; the transaction was rolled back.
    #[error("cancelled before commit")]
    Cancelled,
}

/// Error carried by a [`ReconciliationOutcome`](crate::ReconciliationOutcome).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// Local state could not be read or committed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// External mirroring failed after the local commit.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The request was cancelled.
    #[error("reconciliation cancelled {stage}")]
    Cancelled { stage: CancelStage },
}

impl From<ApplyError> for ReconcileError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Storage(e) => ReconcileError::Storage(e),
            ApplyError::Cancelled => ReconcileError::Cancelled {
                stage: CancelStage::BeforeCommit,
            },
        }
    }
}

/// Point at which a reconciliation was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStage {
    /// Nothing was committed locally.
    BeforeCommit,
    /// Local state was committed; external mirroring did not finish.
    AfterCommit,
}

impl std::fmt::Display for CancelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelStage::BeforeCommit => f.write_str("before local commit"),
            CancelStage::AfterCommit => f.write_str("after local commit"),
        }
    }
}

/// Result alias for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result alias for profile synchronization.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::conflict("membership 00u1 already exists");
        assert_eq!(
            err.to_string(),
            "storage conflict: membership 00u1 already exists"
        );
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn test_storage_transient_classification() {
        assert!(StorageError::unavailable("pool timed out").is_transient());
        assert!(!StorageError::conflict("dup").is_transient());
        assert!(!StorageError::not_found("row").is_transient());
    }

    #[test]
    fn test_sync_error_profile_id() {
        let err = SyncError::AttributeFormat {
            profile_id: ProfileId::new("00u1"),
            attribute: "roles".to_string(),
            message: "entry 0 is not a string".to_string(),
        };
        assert_eq!(err.profile_id().as_str(), "00u1");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("roles"));
    }

    #[test]
    fn test_apply_error_converts_to_reconcile_error() {
        let err: ReconcileError = ApplyError::Cancelled.into();
        assert_eq!(
            err,
            ReconcileError::Cancelled {
                stage: CancelStage::BeforeCommit
            }
        );
        assert_eq!(err.to_string(), "reconciliation cancelled before local commit");

        let err: ReconcileError = ApplyError::Storage(StorageError::not_found("x")).into();
        assert!(matches!(err, ReconcileError::Storage(StorageError::NotFound { .. })));
    }
}
