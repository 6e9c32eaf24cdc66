//! In-memory [`MembershipStore`] and [`DirectoryStore`].
//!
//! Behaves like the PostgreSQL store: members must be registered employees,
//! duplicate memberships conflict, removing a non-member is not found, and a
//! transaction's operations are staged until commit. Failures can be injected
//! per operation for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::directory::{DirectoryStore, Employee, GroupRecord, Page};
use crate::error::{StorageError, StorageResult};
use crate::ids::{GroupKey, ProfileId};
use crate::member::{Member, MemberSet};
use crate::store::{MembershipStore, MembershipTransaction};

#[derive(Debug, Default)]
struct State {
    employees: HashMap<ProfileId, Employee>,
    group_records: HashMap<GroupKey, Option<String>>,
    groups: HashMap<GroupKey, MemberSet>,
    add_failures: HashMap<ProfileId, StorageError>,
    remove_failures: HashMap<ProfileId, StorageError>,
    fetch_failure: Option<StorageError>,
    commit_failure: Option<StorageError>,
    directory_failure: Option<StorageError>,
}

impl State {
    fn record(&self, name: &GroupKey) -> Option<GroupRecord> {
        self.group_records.get(name).map(|external_id| GroupRecord {
            name: name.clone(),
            external_id: external_id.clone(),
        })
    }

    fn check_directory(&self) -> StorageResult<()> {
        match &self.directory_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
    abandoned: AtomicUsize,
}

/// Thread-safe in-memory membership and directory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipStore {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    op_delay: Option<Duration>,
}

impl InMemoryMembershipStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every transactional operation (to exercise cancellation).
    #[must_use]
    pub fn with_operation_delay(mut self, delay: Duration) -> Self {
        self.op_delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register an employee that may become a group member.
    ///
    /// `display` is used as both name and email.
    pub fn register_profile(&self, id: impl Into<ProfileId>, display: impl Into<String>) {
        let display = display.into();
        let employee = Employee::new(id, display.clone(), display);
        self.lock().employees.insert(employee.id.clone(), employee);
    }

    /// Seed a group with members, registering the group and its employees.
    pub fn seed_group(&self, group: impl Into<GroupKey>, members: &[Member]) {
        let group = group.into();
        let mut state = self.lock();
        state.group_records.entry(group.clone()).or_insert(None);
        let entry = state.groups.entry(group).or_default();
        for member in members {
            entry.insert(member.clone());
        }
        for member in members {
            state.employees.insert(
                member.id.clone(),
                Employee::new(member.id.clone(), member.display.clone(), member.display.clone()),
            );
        }
    }

    /// Make `add_member` fail for this profile.
    pub fn fail_add(&self, id: impl Into<ProfileId>, error: StorageError) {
        self.lock().add_failures.insert(id.into(), error);
    }

    /// Make `remove_member` fail for this profile.
    pub fn fail_remove(&self, id: impl Into<ProfileId>, error: StorageError) {
        self.lock().remove_failures.insert(id.into(), error);
    }

    /// Make `fetch_members` fail.
    pub fn fail_fetch(&self, error: StorageError) {
        self.lock().fetch_failure = Some(error);
    }

    /// Make `commit` fail.
    pub fn fail_commit(&self, error: StorageError) {
        self.lock().commit_failure = Some(error);
    }

    /// Make every [`DirectoryStore`] call fail.
    pub fn fail_directory(&self, error: StorageError) {
        self.lock().directory_failure = Some(error);
    }

    /// Committed member ids of a group, sorted.
    #[must_use]
    pub fn member_ids(&self, group: &GroupKey) -> Vec<ProfileId> {
        self.lock()
            .groups
            .get(group)
            .map(MemberSet::sorted_ids)
            .unwrap_or_default()
    }

    /// Whether a group record exists.
    #[must_use]
    pub fn has_group(&self, group: &GroupKey) -> bool {
        self.lock().group_records.contains_key(group)
    }

    /// Stored employee, if any.
    #[must_use]
    pub fn employee(&self, id: &str) -> Option<Employee> {
        self.lock().employees.get(id).cloned()
    }

    /// Number of transactions opened.
    #[must_use]
    pub fn transactions_begun(&self) -> usize {
        self.counters.begun.load(Ordering::SeqCst)
    }

    /// Number of transactions committed.
    #[must_use]
    pub fn transactions_committed(&self) -> usize {
        self.counters.committed.load(Ordering::SeqCst)
    }

    /// Number of transactions explicitly rolled back.
    #[must_use]
    pub fn transactions_rolled_back(&self) -> usize {
        self.counters.rolled_back.load(Ordering::SeqCst)
    }

    /// Number of transactions dropped without commit or rollback.
    #[must_use]
    pub fn transactions_abandoned(&self) -> usize {
        self.counters.abandoned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn fetch_members(&self, group: &GroupKey) -> StorageResult<MemberSet> {
        let state = self.lock();
        if let Some(err) = &state.fetch_failure {
            return Err(err.clone());
        }
        Ok(state.groups.get(group).cloned().unwrap_or_default())
    }

    async fn begin(&self) -> StorageResult<Box<dyn MembershipTransaction>> {
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            staged: Vec::new(),
            finished: false,
        }))
    }
}

#[derive(Debug, Clone)]
enum StagedOp {
    Add(GroupKey, ProfileId),
    Remove(GroupKey, ProfileId),
    DeleteGroup(GroupKey),
}

struct InMemoryTransaction {
    store: InMemoryMembershipStore,
    staged: Vec<StagedOp>,
    finished: bool,
}

impl InMemoryTransaction {
    async fn pause(&self) {
        if let Some(delay) = self.store.op_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn is_member(&self, state: &State, group: &GroupKey, member: &ProfileId) -> bool {
        let mut present = state
            .groups
            .get(group)
            .is_some_and(|set| set.contains(member.as_str()));
        for op in &self.staged {
            match op {
                StagedOp::Add(g, m) if g == group && m == member => present = true,
                StagedOp::Remove(g, m) if g == group && m == member => present = false,
                _ => {}
            }
        }
        present
    }
}

#[async_trait]
impl MembershipTransaction for InMemoryTransaction {
    async fn add_member(&mut self, group: &GroupKey, member: &ProfileId) -> StorageResult<()> {
        self.pause().await;
        {
            let state = self.store.lock();
            if let Some(err) = state.add_failures.get(member) {
                return Err(err.clone());
            }
            if !state.employees.contains_key(member) {
                return Err(StorageError::not_found(format!("profile {member}")));
            }
            if self.is_member(&state, group, member) {
                return Err(StorageError::conflict(format!(
                    "{member} is already a member of {group}"
                )));
            }
        }
        self.staged
            .push(StagedOp::Add(group.clone(), member.clone()));
        Ok(())
    }

    async fn remove_member(&mut self, group: &GroupKey, member: &ProfileId) -> StorageResult<()> {
        self.pause().await;
        {
            let state = self.store.lock();
            if let Some(err) = state.remove_failures.get(member) {
                return Err(err.clone());
            }
            if !self.is_member(&state, group, member) {
                return Err(StorageError::not_found(format!(
                    "{member} is not a member of {group}"
                )));
            }
        }
        self.staged
            .push(StagedOp::Remove(group.clone(), member.clone()));
        Ok(())
    }

    async fn delete_group(&mut self, group: &GroupKey) -> StorageResult<()> {
        self.pause().await;
        {
            let state = self.store.lock();
            let staged_add = self
                .staged
                .iter()
                .any(|op| matches!(op, StagedOp::Add(g, _) if g == group));
            if !state.group_records.contains_key(group) && !staged_add {
                return Err(StorageError::not_found(format!("group {group}")));
            }
        }
        self.staged.push(StagedOp::DeleteGroup(group.clone()));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.finished = true;
        let mut state = self.store.lock();
        if let Some(err) = state.commit_failure.clone() {
            return Err(err);
        }

        // Work on a copy so a late conflict leaves committed state untouched.
        let mut groups = state.groups.clone();
        let mut records = state.group_records.clone();
        for op in &self.staged {
            match op {
                StagedOp::Add(group, member) => {
                    let display = state
                        .employees
                        .get(member)
                        .map(|e| e.email.clone())
                        .unwrap_or_default();
                    records.entry(group.clone()).or_insert(None);
                    if !groups
                        .entry(group.clone())
                        .or_default()
                        .insert(Member::new(member.clone(), display))
                    {
                        return Err(StorageError::conflict(format!(
                            "{member} was added to {group} concurrently"
                        )));
                    }
                }
                StagedOp::Remove(group, member) => {
                    let removed = groups.get_mut(group).is_some_and(|set| {
                        let remaining: MemberSet = set
                            .iter()
                            .filter(|m| &m.id != member)
                            .cloned()
                            .collect();
                        let changed = remaining.len() != set.len();
                        *set = remaining;
                        changed
                    });
                    if !removed {
                        return Err(StorageError::not_found(format!(
                            "{member} was removed from {group} concurrently"
                        )));
                    }
                }
                StagedOp::DeleteGroup(group) => {
                    if groups.get(group).is_some_and(|set| !set.is_empty()) {
                        return Err(StorageError::conflict(format!(
                            "{group} still has members"
                        )));
                    }
                    groups.remove(group);
                    if records.remove(group).is_none() {
                        return Err(StorageError::not_found(format!(
                            "group {group} was deleted concurrently"
                        )));
                    }
                }
            }
        }
        state.groups = groups;
        state.group_records = records;
        drop(state);

        self.store.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.finished = true;
        self.staged.clear();
        self.store.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.store.counters.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl DirectoryStore for InMemoryMembershipStore {
    async fn upsert_employee(&self, employee: &Employee) -> StorageResult<Employee> {
        let mut state = self.lock();
        state.check_directory()?;
        state
            .employees
            .insert(employee.id.clone(), employee.clone());
        Ok(employee.clone())
    }

    async fn get_employee(&self, id: &ProfileId) -> StorageResult<Option<Employee>> {
        let state = self.lock();
        state.check_directory()?;
        Ok(state.employees.get(id).cloned())
    }

    async fn find_employee_by_email(&self, email: &str) -> StorageResult<Option<Employee>> {
        let state = self.lock();
        state.check_directory()?;
        Ok(state
            .employees
            .values()
            .filter(|e| e.email == email)
            .min_by(|a, b| a.id.cmp(&b.id))
            .cloned())
    }

    async fn list_employees(&self, page: Page) -> StorageResult<Vec<Employee>> {
        let state = self.lock();
        state.check_directory()?;
        let mut employees: Vec<Employee> = state.employees.values().cloned().collect();
        employees.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(employees
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn deactivate_employee(&self, id: &ProfileId) -> StorageResult<()> {
        let mut state = self.lock();
        state.check_directory()?;
        match state.employees.get_mut(id) {
            Some(employee) => {
                employee.active = false;
                Ok(())
            }
            None => Err(StorageError::not_found(format!("employee {id}"))),
        }
    }

    async fn create_group(&self, group: &GroupKey, external_id: &str) -> StorageResult<GroupRecord> {
        let mut state = self.lock();
        state.check_directory()?;
        if state.group_records.contains_key(group) {
            return Err(StorageError::conflict(format!("group {group} already exists")));
        }
        state
            .group_records
            .insert(group.clone(), Some(external_id.to_string()));
        Ok(GroupRecord {
            name: group.clone(),
            external_id: Some(external_id.to_string()),
        })
    }

    async fn bind_group(&self, group: &GroupKey, external_id: &str) -> StorageResult<GroupRecord> {
        let mut state = self.lock();
        state.check_directory()?;
        for (name, bound) in &mut state.group_records {
            if name != group && bound.as_deref() == Some(external_id) {
                *bound = None;
            }
        }
        state
            .group_records
            .insert(group.clone(), Some(external_id.to_string()));
        Ok(GroupRecord {
            name: group.clone(),
            external_id: Some(external_id.to_string()),
        })
    }

    async fn find_group(&self, external_id: &str) -> StorageResult<Option<GroupRecord>> {
        let state = self.lock();
        state.check_directory()?;
        Ok(state
            .group_records
            .iter()
            .find(|(_, bound)| bound.as_deref() == Some(external_id))
            .and_then(|(name, _)| state.record(name)))
    }

    async fn find_group_by_name(&self, group: &GroupKey) -> StorageResult<Option<GroupRecord>> {
        let state = self.lock();
        state.check_directory()?;
        Ok(state.record(group))
    }

    async fn list_groups(&self, page: Page) -> StorageResult<Vec<GroupRecord>> {
        let state = self.lock();
        state.check_directory()?;
        let mut names: Vec<&GroupKey> = state.group_records.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .filter_map(|name| state.record(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupKey {
        GroupKey::new("twilio-agent")
    }

    #[tokio::test]
    async fn test_commit_makes_operations_visible() {
        let store = InMemoryMembershipStore::new();
        store.seed_group("twilio-agent", &[Member::new("A", "a@example.com")]);
        store.register_profile("B", "b@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.add_member(&group(), &ProfileId::new("B")).await.unwrap();
        tx.remove_member(&group(), &ProfileId::new("A"))
            .await
            .unwrap();

        // Not visible before commit.
        assert_eq!(store.member_ids(&group()), vec![ProfileId::new("A")]);

        tx.commit().await.unwrap();
        assert_eq!(store.member_ids(&group()), vec![ProfileId::new("B")]);
        assert_eq!(store.transactions_committed(), 1);
    }

    #[tokio::test]
    async fn test_drop_discards_operations() {
        let store = InMemoryMembershipStore::new();
        store.register_profile("A", "a@example.com");

        {
            let mut tx = store.begin().await.unwrap();
            tx.add_member(&group(), &ProfileId::new("A")).await.unwrap();
        }

        assert!(store.member_ids(&group()).is_empty());
        assert_eq!(store.transactions_abandoned(), 1);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let store = InMemoryMembershipStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx
            .add_member(&group(), &ProfileId::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_add_conflicts() {
        let store = InMemoryMembershipStore::new();
        store.seed_group("twilio-agent", &[Member::new("A", "a@example.com")]);

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .add_member(&group(), &ProfileId::new("A"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let store = InMemoryMembershipStore::new();
        store.fail_fetch(StorageError::unavailable("connection reset"));

        let err = store.fetch_members(&group()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_delete_group_requires_no_members() {
        let store = InMemoryMembershipStore::new();
        store.seed_group("twilio-agent", &[Member::new("A", "a@example.com")]);

        let mut tx = store.begin().await.unwrap();
        tx.delete_group(&group()).await.unwrap();
        let err = tx.commit().await.unwrap_err();

        assert!(matches!(err, StorageError::Conflict { .. }));
        assert!(store.has_group(&group()));
    }

    #[tokio::test]
    async fn test_commit_creates_group_record() {
        let store = InMemoryMembershipStore::new();
        store.register_profile("A", "a@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.add_member(&group(), &ProfileId::new("A")).await.unwrap();
        tx.commit().await.unwrap();

        let record = store.find_group_by_name(&group()).await.unwrap().unwrap();
        assert_eq!(record.external_id, None);
        let members = store.fetch_members(&group()).await.unwrap();
        assert_eq!(members.get("A").unwrap().display, "a@example.com");
    }

    #[tokio::test]
    async fn test_bind_group_moves_external_id() {
        let store = InMemoryMembershipStore::new();
        store.bind_group(&GroupKey::new("old-name"), "00g1").await.unwrap();
        store.bind_group(&group(), "00g1").await.unwrap();

        let found = store.find_group("00g1").await.unwrap().unwrap();
        assert_eq!(found.name, group());
        let old = store
            .find_group_by_name(&GroupKey::new("old-name"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old.external_id, None);
    }

    #[tokio::test]
    async fn test_create_group_conflicts_on_existing_name() {
        let store = InMemoryMembershipStore::new();
        store.create_group(&group(), "00g1").await.unwrap();

        let err = store.create_group(&group(), "00g2").await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_employee_lookup_and_deactivation() {
        let store = InMemoryMembershipStore::new();
        store
            .upsert_employee(&Employee::new("00u2", "Bob Jones", "bob@example.com"))
            .await
            .unwrap();
        store
            .upsert_employee(&Employee::new("00u1", "Alice Smith", "alice@example.com"))
            .await
            .unwrap();

        let found = store
            .find_employee_by_email("bob@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, ProfileId::new("00u2"));

        let page = store
            .list_employees(Page::from_start_index(2, 10))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ProfileId::new("00u2"));

        store
            .deactivate_employee(&ProfileId::new("00u1"))
            .await
            .unwrap();
        assert!(!store.employee("00u1").unwrap().active);

        let err = store
            .deactivate_employee(&ProfileId::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
