//! Transactional applier.
//!
//! Applies a [`MembershipDiff`] to the store inside a single transaction:
//! either every add and remove becomes visible or none does.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::diff::MembershipDiff;
use crate::error::ApplyError;
use crate::ids::GroupKey;
use crate::store::{MembershipStore, MembershipTransaction};

/// Commits membership diffs atomically.
pub struct TransactionalApplier<S: MembershipStore + ?Sized> {
    store: Arc<S>,
}

impl<S: MembershipStore + ?Sized> Clone for TransactionalApplier<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: MembershipStore + ?Sized> TransactionalApplier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply `diff` to `group`.
    ///
    /// An empty diff returns immediately without opening a transaction. On any
    /// store error the transaction is rolled back and the error is returned as
    /// is. If `cancel` fires before commit the transaction is rolled back and
    /// [`ApplyError::Cancelled`] is returned. The commit itself is not
    /// interrupted once started.
    #[instrument(skip(self, diff, cancel), fields(adds = diff.to_add.len(), removes = diff.to_remove.len()))]
    pub async fn apply(
        &self,
        group: &GroupKey,
        diff: &MembershipDiff,
        cancel: &CancellationToken,
    ) -> Result<(), ApplyError> {
        if diff.is_empty() {
            debug!("Empty diff, nothing to apply");
            return Ok(());
        }
        self.run(group, diff, false, cancel).await
    }

    /// Apply `diff` and delete the group record in the same transaction.
    ///
    /// `diff` must remove every current member. Cancellation and failures
    /// behave as in [`apply`](Self::apply); the group survives unless
    /// everything commits.
    #[instrument(skip(self, diff, cancel), fields(removes = diff.to_remove.len()))]
    pub async fn dissolve(
        &self,
        group: &GroupKey,
        diff: &MembershipDiff,
        cancel: &CancellationToken,
    ) -> Result<(), ApplyError> {
        self.run(group, diff, true, cancel).await
    }

    async fn run(
        &self,
        group: &GroupKey,
        diff: &MembershipDiff,
        delete_group: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ApplyError> {
        if cancel.is_cancelled() {
            debug!("Cancelled before opening a transaction");
            return Err(ApplyError::Cancelled);
        }

        let mut tx = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ApplyError::Cancelled),
            tx = self.store.begin() => tx?,
        };

        if let Err(err) = issue_operations(tx.as_mut(), group, diff, delete_group, cancel).await {
            roll_back(tx, group, &err).await;
            return Err(err);
        }

        if cancel.is_cancelled() {
            let err = ApplyError::Cancelled;
            roll_back(tx, group, &err).await;
            return Err(err);
        }

        tx.commit().await?;

        info!(
            group = %group,
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            deleted = delete_group,
            "Membership diff committed"
        );
        Ok(())
    }
}

async fn issue_operations(
    tx: &mut dyn MembershipTransaction,
    group: &GroupKey,
    diff: &MembershipDiff,
    delete_group: bool,
    cancel: &CancellationToken,
) -> Result<(), ApplyError> {
    for id in diff.added_ids() {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ApplyError::Cancelled),
            res = tx.add_member(group, &id) => res?,
        }
    }

    for id in diff.removed_ids() {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ApplyError::Cancelled),
            res = tx.remove_member(group, &id) => res?,
        }
    }

    if delete_group {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ApplyError::Cancelled),
            res = tx.delete_group(group) => res?,
        }
    }

    Ok(())
}

async fn roll_back(tx: Box<dyn MembershipTransaction>, group: &GroupKey, cause: &ApplyError) {
    match tx.rollback().await {
        Ok(()) => debug!(group = %group, cause = %cause, "Transaction rolled back"),
        Err(rollback_err) => warn!(
            group = %group,
            cause = %cause,
            error = %rollback_err,
            "Rollback failed; the store discards the uncommitted transaction"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::error::StorageError;
    use crate::ids::ProfileId;
    use crate::member::{Member, MemberSet};
    use crate::memory::InMemoryMembershipStore;
    use std::time::Duration;

    fn group() -> GroupKey {
        GroupKey::new("twilio-agent")
    }

    fn seeded_store() -> Arc<InMemoryMembershipStore> {
        let store = InMemoryMembershipStore::new();
        store.seed_group(
            "twilio-agent",
            &[
                Member::new("A", "a@example.com"),
                Member::new("B", "b@example.com"),
            ],
        );
        store.register_profile("C", "c@example.com");
        Arc::new(store)
    }

    fn desired(ids: &[&str]) -> MemberSet {
        MemberSet::from_requested(ids.iter().map(|id| Member::new(*id, format!("{id}@example.com"))))
    }

    async fn current(store: &InMemoryMembershipStore) -> MemberSet {
        store.fetch_members(&group()).await.unwrap()
    }

    #[tokio::test]
    async fn test_apply_commits_adds_and_removes() {
        let store = seeded_store();
        let applier = TransactionalApplier::new(store.clone());
        let d = diff(&current(&store).await, &desired(&["B", "C"]));

        applier
            .apply(&group(), &d, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            store.member_ids(&group()),
            vec![ProfileId::new("B"), ProfileId::new("C")]
        );
        assert_eq!(store.transactions_committed(), 1);
    }

    #[tokio::test]
    async fn test_empty_diff_opens_no_transaction() {
        let store = seeded_store();
        let applier = TransactionalApplier::new(store.clone());

        applier
            .apply(&group(), &MembershipDiff::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.transactions_begun(), 0);
    }

    #[tokio::test]
    async fn test_failure_mid_apply_leaves_store_untouched() {
        let store = seeded_store();
        store.fail_remove("A", StorageError::unavailable("connection reset"));
        let applier = TransactionalApplier::new(store.clone());
        let before = current(&store).await;
        let d = diff(&before, &desired(&["B", "C"]));

        let err = applier
            .apply(&group(), &d, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ApplyError::Storage(StorageError::unavailable("connection reset"))
        );
        assert_eq!(current(&store).await, before);
        assert_eq!(store.transactions_rolled_back(), 1);
        assert_eq!(store.transactions_committed(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_returned() {
        let store = seeded_store();
        store.fail_commit(StorageError::conflict("serialization failure"));
        let applier = TransactionalApplier::new(store.clone());
        let before = current(&store).await;
        let d = diff(&before, &desired(&["C"]));

        let err = applier
            .apply(&group(), &d, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Storage(StorageError::Conflict { .. })));
        assert_eq!(current(&store).await, before);
    }

    #[tokio::test]
    async fn test_cancelled_token_applies_nothing() {
        let store = seeded_store();
        let applier = TransactionalApplier::new(store.clone());
        let before = current(&store).await;
        let d = diff(&before, &desired(&["C"]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = applier.apply(&group(), &d, &cancel).await.unwrap_err();

        assert_eq!(err, ApplyError::Cancelled);
        assert_eq!(current(&store).await, before);
        assert_eq!(store.transactions_begun(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_apply_rolls_back() {
        let store = InMemoryMembershipStore::new().with_operation_delay(Duration::from_millis(50));
        store.seed_group(
            "twilio-agent",
            &[
                Member::new("A", "a@example.com"),
                Member::new("B", "b@example.com"),
            ],
        );
        store.register_profile("C", "c@example.com");
        let store = Arc::new(store);
        let applier = TransactionalApplier::new(store.clone());
        let before = current(&store).await;
        let d = diff(&before, &desired(&["C"]));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(75)).await;
            trigger.cancel();
        });

        let err = applier.apply(&group(), &d, &cancel).await.unwrap_err();

        assert_eq!(err, ApplyError::Cancelled);
        assert_eq!(current(&store).await, before);
        assert_eq!(store.transactions_begun(), 1);
        assert_eq!(store.transactions_rolled_back(), 1);
        assert_eq!(store.transactions_committed(), 0);
    }

    #[tokio::test]
    async fn test_dissolve_removes_members_and_group() {
        let store = seeded_store();
        let applier = TransactionalApplier::new(store.clone());
        let d = diff(&current(&store).await, &MemberSet::new());

        applier
            .dissolve(&group(), &d, &CancellationToken::new())
            .await
            .unwrap();

        assert!(store.member_ids(&group()).is_empty());
        assert!(!store.has_group(&group()));
        assert_eq!(store.transactions_committed(), 1);
    }

    #[tokio::test]
    async fn test_dissolve_failure_keeps_group_and_members() {
        let store = seeded_store();
        store.fail_remove("B", StorageError::unavailable("connection reset"));
        let applier = TransactionalApplier::new(store.clone());
        let before = current(&store).await;
        let d = diff(&before, &MemberSet::new());

        let err = applier
            .dissolve(&group(), &d, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Storage(StorageError::Unavailable { .. })));
        assert_eq!(current(&store).await, before);
        assert!(store.has_group(&group()));
    }

    #[tokio::test]
    async fn test_dissolve_unknown_group_is_not_found() {
        let store = Arc::new(InMemoryMembershipStore::new());
        let applier = TransactionalApplier::new(store.clone());

        let err = applier
            .dissolve(&group(), &MembershipDiff::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Storage(StorageError::NotFound { .. })));
        assert_eq!(store.transactions_rolled_back(), 1);
    }
}
