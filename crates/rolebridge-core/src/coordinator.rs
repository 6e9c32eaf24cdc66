//! Reconciliation coordinator.
//!
//! Drives one desired-state request end to end: fetch current membership,
//! diff, commit locally, then mirror role changes to external profiles. The
//! external leg runs only after a successful commit and never undoes it.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::applier::TransactionalApplier;
use crate::diff::{diff, MembershipDiff};
use crate::error::{CancelStage, ReconcileError, StorageResult, SyncError, SyncResult};
use crate::ids::{GroupKey, ProfileId};
use crate::mapping::RoleMapping;
use crate::member::{Member, MemberSet};
use crate::profile::ProfileService;
use crate::store::MembershipStore;
use crate::sync::RoleAttributeSynchronizer;

/// Overall classification of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationStatus {
    /// Current state already matched; nothing was written anywhere.
    Unchanged,
    /// Local commit and external mirroring both succeeded.
    Completed,
    /// Local state committed, external profiles are stale.
    PartiallyApplied,
    /// Nothing changed locally.
    Failed,
}

/// Result of [`ReconciliationCoordinator::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub group: GroupKey,
    /// Local changes were committed (trivially true for an empty diff).
    pub applied: bool,
    /// External profiles reflect the committed changes.
    pub external_sync_applied: bool,
    /// First error encountered, if any.
    pub error: Option<ReconcileError>,
    /// Ids the diff adds to the group, sorted.
    pub added: Vec<ProfileId>,
    /// Ids the diff removes from the group, sorted.
    pub removed: Vec<ProfileId>,
    /// Profiles whose external role was not confirmed (failed or skipped).
    pub failed_profiles: Vec<ProfileId>,
}

impl ReconciliationOutcome {
    fn failed(group: &GroupKey, planned: Option<&MembershipDiff>, error: ReconcileError) -> Self {
        Self {
            group: group.clone(),
            applied: false,
            external_sync_applied: false,
            error: Some(error),
            added: planned.map(MembershipDiff::added_ids).unwrap_or_default(),
            removed: planned.map(MembershipDiff::removed_ids).unwrap_or_default(),
            failed_profiles: Vec::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> ReconciliationStatus {
        match (self.applied, self.external_sync_applied) {
            (false, _) => ReconciliationStatus::Failed,
            (true, false) => ReconciliationStatus::PartiallyApplied,
            (true, true) if self.added.is_empty() && self.removed.is_empty() => {
                ReconciliationStatus::Unchanged
            }
            (true, true) => ReconciliationStatus::Completed,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The part of the diff whose external leg still needs to run.
    ///
    /// Feed it to [`ReconciliationCoordinator::mirror_external`] to re-drive
    /// only the external step.
    #[must_use]
    pub fn pending_external_diff(&self) -> MembershipDiff {
        let failed: HashSet<&ProfileId> = self.failed_profiles.iter().collect();
        MembershipDiff {
            to_add: MemberSet::from_members(
                self.added
                    .iter()
                    .filter(|id| failed.contains(id))
                    .map(|id| Member::new(id.clone(), String::new())),
            ),
            to_remove: self
                .removed
                .iter()
                .filter(|id| failed.contains(id))
                .cloned()
                .collect(),
        }
    }
}

/// Outcome of the external leg alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalSyncReport {
    /// Profiles whose external role was not confirmed, sorted.
    pub failed_profiles: Vec<ProfileId>,
    /// First error encountered.
    pub error: Option<ReconcileError>,
}

impl ExternalSyncReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
enum RoleChange {
    Grant,
    Revoke,
}

/// Orchestrates diff, local commit and external mirroring.
pub struct ReconciliationCoordinator<S, P>
where
    S: MembershipStore + ?Sized,
    P: ProfileService + ?Sized,
{
    store: Arc<S>,
    applier: TransactionalApplier<S>,
    synchronizer: RoleAttributeSynchronizer<P>,
    mapping: RoleMapping,
}

impl<S, P> ReconciliationCoordinator<S, P>
where
    S: MembershipStore + ?Sized,
    P: ProfileService + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        synchronizer: RoleAttributeSynchronizer<P>,
        mapping: RoleMapping,
    ) -> Self {
        Self {
            applier: TransactionalApplier::new(Arc::clone(&store)),
            store,
            synchronizer,
            mapping,
        }
    }

    #[must_use]
    pub fn mapping(&self) -> &RoleMapping {
        &self.mapping
    }

    /// Committed members of `group`.
    pub async fn members(&self, group: &GroupKey) -> StorageResult<MemberSet> {
        self.store.fetch_members(group).await
    }

    /// Move `group` to exactly the `desired` membership.
    ///
    /// Entries with an empty id or display are ignored. Storage failures and
    /// cancellation before commit leave everything untouched. External
    /// failures are reported next to the successful commit; every remaining
    /// profile is still attempted.
    #[instrument(skip(self, desired, cancel))]
    pub async fn reconcile<I>(
        &self,
        group: &GroupKey,
        desired: I,
        cancel: &CancellationToken,
    ) -> ReconciliationOutcome
    where
        I: IntoIterator<Item = Member> + Send,
    {
        let desired = MemberSet::from_requested(desired);

        let current = match self.store.fetch_members(group).await {
            Ok(current) => current,
            Err(err) => {
                warn!(error = %err, "Failed to fetch current membership");
                return ReconciliationOutcome::failed(group, None, err.into());
            }
        };

        let planned = diff(&current, &desired);

        if let Err(err) = self.applier.apply(group, &planned, cancel).await {
            warn!(error = %err, "Local apply failed, no external changes made");
            return ReconciliationOutcome::failed(group, Some(&planned), err.into());
        }

        self.finish(group, planned, cancel).await
    }

    /// Remove every member of `group`, then the group record itself.
    ///
    /// Both happen in one local commit. Removed members lose the mapped
    /// role afterwards exactly as with [`reconcile`](Self::reconcile). An
    /// unknown group fails with a storage `NotFound`.
    #[instrument(skip(self, cancel))]
    pub async fn dissolve(&self, group: &GroupKey, cancel: &CancellationToken) -> ReconciliationOutcome {
        let current = match self.store.fetch_members(group).await {
            Ok(current) => current,
            Err(err) => {
                warn!(error = %err, "Failed to fetch current membership");
                return ReconciliationOutcome::failed(group, None, err.into());
            }
        };

        let planned = diff(&current, &MemberSet::new());

        if let Err(err) = self.applier.dissolve(group, &planned, cancel).await {
            warn!(error = %err, "Group deletion failed, no external changes made");
            return ReconciliationOutcome::failed(group, Some(&planned), err.into());
        }

        self.finish(group, planned, cancel).await
    }

    async fn finish(
        &self,
        group: &GroupKey,
        planned: MembershipDiff,
        cancel: &CancellationToken,
    ) -> ReconciliationOutcome {
        let report = self.mirror_external(group, &planned, cancel).await;
        let outcome = ReconciliationOutcome {
            group: group.clone(),
            applied: true,
            external_sync_applied: report.is_complete(),
            error: report.error,
            added: planned.added_ids(),
            removed: planned.removed_ids(),
            failed_profiles: report.failed_profiles,
        };

        match outcome.status() {
            ReconciliationStatus::PartiallyApplied => warn!(
                added = outcome.added.len(),
                removed = outcome.removed.len(),
                failed = outcome.failed_profiles.len(),
                "Membership committed but external roles are stale"
            ),
            status => info!(
                ?status,
                added = outcome.added.len(),
                removed = outcome.removed.len(),
                "Reconciliation finished"
            ),
        }
        outcome
    }

    /// Mirror `diff` onto external profiles without touching the store.
    ///
    /// A group without a mapped role has nothing to mirror. Once `cancel`
    /// fires no further calls are issued, and the profiles not yet handled
    /// are reported as failed.
    #[instrument(skip(self, diff, cancel))]
    pub async fn mirror_external(
        &self,
        group: &GroupKey,
        diff: &MembershipDiff,
        cancel: &CancellationToken,
    ) -> ExternalSyncReport {
        let Some(role) = self.mapping.role_for(group) else {
            info!("Group has no mapped role, skipping external sync");
            return ExternalSyncReport::default();
        };

        let changes: Vec<(ProfileId, RoleChange)> = diff
            .added_ids()
            .into_iter()
            .map(|id| (id, RoleChange::Grant))
            .chain(
                diff.removed_ids()
                    .into_iter()
                    .map(|id| (id, RoleChange::Revoke)),
            )
            .collect();

        let mut report = ExternalSyncReport::default();
        let mut remaining = changes.into_iter();

        while let Some((profile_id, change)) = remaining.next() {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                res = self.apply_change(&profile_id, role, change) => Some(res),
            };

            match result {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    warn!(profile_id = %profile_id, error = %err, "External role sync failed");
                    report.failed_profiles.push(profile_id);
                    report.error.get_or_insert(ReconcileError::Sync(err));
                }
                None => {
                    warn!("Cancelled during external sync");
                    report.failed_profiles.push(profile_id);
                    report
                        .failed_profiles
                        .extend(remaining.by_ref().map(|(id, _)| id));
                    report.error.get_or_insert(ReconcileError::Cancelled {
                        stage: CancelStage::AfterCommit,
                    });
                }
            }
        }

        report.failed_profiles.sort();
        report.failed_profiles.dedup();
        report
    }

    async fn apply_change(
        &self,
        profile_id: &ProfileId,
        role: &str,
        change: RoleChange,
    ) -> Result<(), SyncError> {
        match change {
            RoleChange::Grant => self.synchronizer.add_role(profile_id, role).await,
            RoleChange::Revoke => self.synchronizer.remove_role(profile_id, role).await,
        }
    }

    /// Grant `role` on a single profile.
    pub async fn add_role(&self, profile_id: &ProfileId, role: &str) -> SyncResult<()> {
        self.synchronizer.add_role(profile_id, role).await
    }

    /// Revoke `role` on a single profile.
    pub async fn remove_role(&self, profile_id: &ProfileId, role: &str) -> SyncResult<()> {
        self.synchronizer.remove_role(profile_id, role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(added: &[&str], removed: &[&str], failed: &[&str]) -> ReconciliationOutcome {
        let ids = |v: &[&str]| v.iter().map(|s| ProfileId::new(*s)).collect::<Vec<_>>();
        ReconciliationOutcome {
            group: GroupKey::new("twilio-agent"),
            applied: true,
            external_sync_applied: failed.is_empty(),
            error: None,
            added: ids(added),
            removed: ids(removed),
            failed_profiles: ids(failed),
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(outcome(&[], &[], &[]).status(), ReconciliationStatus::Unchanged);
        assert_eq!(outcome(&["A"], &[], &[]).status(), ReconciliationStatus::Completed);
        assert_eq!(
            outcome(&["A"], &[], &["A"]).status(),
            ReconciliationStatus::PartiallyApplied
        );

        let failed = ReconciliationOutcome::failed(
            &GroupKey::new("g"),
            None,
            ReconcileError::Cancelled {
                stage: CancelStage::BeforeCommit,
            },
        );
        assert_eq!(failed.status(), ReconciliationStatus::Failed);
        assert!(!failed.is_success());
    }

    #[test]
    fn test_pending_external_diff_keeps_only_failed_profiles() {
        let o = outcome(&["A", "C"], &["B", "D"], &["C", "D"]);
        let pending = o.pending_external_diff();

        assert_eq!(pending.added_ids(), vec![ProfileId::new("C")]);
        assert_eq!(pending.removed_ids(), vec![ProfileId::new("D")]);
    }
}
