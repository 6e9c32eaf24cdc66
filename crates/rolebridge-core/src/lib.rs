//! # Membership Reconciliation
//!
//! Keeps an internal group-membership store and an external profile system
//! consistent when a caller declares the desired members of a group.
//!
//! ## Architecture
//!
//! - [`diff()`] - Pure diff between current and desired member sets
//! - [`TransactionalApplier`] - Commits a diff atomically through a [`MembershipStore`]
//! - [`RoleAttributeSynchronizer`] - Adds/removes one role on an external profile
//! - [`ReconciliationCoordinator`] - Fetch, diff, commit, then mirror externally;
//!   also dissolves a group
//!
//! The store and the profile system are reached only through the
//! [`MembershipStore`] and [`ProfileService`] traits. Which group grants which
//! external role is injected as a [`RoleMapping`].
//!
//! ## Example
//!
//! ```ignore
//! use rolebridge_core::prelude::*;
//!
//! let coordinator = ReconciliationCoordinator::new(
//!     store,
//!     RoleAttributeSynchronizer::new(profiles),
//!     RoleMapping::parse("twilio-agent=agent")?,
//! );
//!
//! let outcome = coordinator
//!     .reconcile(&GroupKey::new("twilio-agent"), members, &CancellationToken::new())
//!     .await;
//!
//! match outcome.status() {
//!     ReconciliationStatus::PartiallyApplied => {
//!         // local state committed, re-drive the external leg later
//!         let pending = outcome.pending_external_diff();
//!     }
//!     _ => {}
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`ids`] - Typed identifiers (`GroupKey`, `ProfileId`)
//! - [`member`] - `Member` and `MemberSet`
//! - [`error`] - Error types with transient classification
//! - [`store`] / [`profile`] - Collaborator traits
//! - [`directory`] - Employee and group records memberships point at
//! - [`memory`] - In-memory store for tests and local runs

pub mod applier;
pub mod coordinator;
pub mod diff;
pub mod directory;
pub mod error;
pub mod ids;
pub mod mapping;
pub mod member;
pub mod memory;
pub mod profile;
pub mod store;
pub mod sync;

pub use applier::TransactionalApplier;
pub use coordinator::{
    ExternalSyncReport, ReconciliationCoordinator, ReconciliationOutcome, ReconciliationStatus,
};
pub use diff::{diff, MembershipDiff};
pub use directory::{DirectoryStore, Employee, GroupRecord, Page};
pub use error::{
    ApplyError, CancelStage, ReconcileError, StorageError, StorageResult, SyncError, SyncResult,
};
pub use ids::{GroupKey, ProfileId};
pub use mapping::{MappingParseError, RoleMapping};
pub use member::{Member, MemberSet};
pub use memory::InMemoryMembershipStore;
pub use profile::ProfileService;
pub use store::{MembershipStore, MembershipTransaction};
pub use sync::{RoleAttributeSynchronizer, DEFAULT_ROLE_ATTRIBUTE};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        ApplyError, DirectoryStore, Employee, GroupKey, GroupRecord, Member, MemberSet,
        MembershipDiff, MembershipStore, MembershipTransaction, ProfileId, ProfileService, ReconcileError,
        ReconciliationCoordinator, ReconciliationOutcome, ReconciliationStatus,
        RoleAttributeSynchronizer, RoleMapping, StorageError, SyncError, TransactionalApplier,
    };
    pub use tokio_util::sync::CancellationToken;
}

// Re-export async_trait for store and profile service implementors
pub use async_trait::async_trait;
