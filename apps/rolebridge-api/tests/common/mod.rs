//! Shared test helpers for the rolebridge API.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio_util::sync::CancellationToken;

use rolebridge_api::{app_router, BasicCredentials, DynCoordinator};
use rolebridge_core::{
    DirectoryStore, GroupKey, InMemoryMembershipStore, MemberSet, MembershipStore,
    MembershipTransaction, ProfileId, ProfileService, ReconciliationCoordinator,
    RoleAttributeSynchronizer, RoleMapping, StorageError, StorageResult, SyncError, SyncResult,
};

pub const USER: &str = "okta";
pub const PASSWORD: &str = "s3cret";
pub const MAPPING: &str = "twilio-agent=agent,twilio-supervisor=supervisor";

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Profile directory holding one role list per profile.
#[derive(Default)]
pub struct MockProfiles {
    attributes: Mutex<HashMap<ProfileId, Value>>,
    fail_write: Mutex<HashSet<ProfileId>>,
    write_call_count: AtomicUsize,
}

impl MockProfiles {
    pub fn set(&self, id: &str, value: Value) {
        self.attributes
            .lock()
            .unwrap()
            .insert(ProfileId::new(id), value);
    }

    pub fn fail_write_for(&self, id: &str) {
        self.fail_write.lock().unwrap().insert(ProfileId::new(id));
    }

    pub fn get(&self, id: &str) -> Value {
        self.attributes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn write_calls(&self) -> usize {
        self.write_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileService for MockProfiles {
    async fn fetch_attribute(
        &self,
        profile_id: &ProfileId,
        _attribute: &str,
    ) -> SyncResult<Option<Value>> {
        match self.attributes.lock().unwrap().get(profile_id) {
            None => Err(SyncError::ProfileFetch {
                profile_id: profile_id.clone(),
                message: "profile not found".to_string(),
            }),
            Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(value.clone())),
        }
    }

    async fn write_attribute(
        &self,
        profile_id: &ProfileId,
        _attribute: &str,
        values: &[String],
    ) -> SyncResult<()> {
        self.write_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_write.lock().unwrap().contains(profile_id) {
            return Err(SyncError::ProfilePersist {
                profile_id: profile_id.clone(),
                message: "503 Service Unavailable".to_string(),
            });
        }
        self.attributes
            .lock()
            .unwrap()
            .insert(profile_id.clone(), Value::from(values.to_vec()));
        Ok(())
    }
}

/// Membership store whose fetches start failing after the first `healthy` ones.
pub struct FlakyFetchStore {
    inner: InMemoryMembershipStore,
    healthy: usize,
    fetches: AtomicUsize,
}

impl FlakyFetchStore {
    pub fn new(inner: InMemoryMembershipStore, healthy: usize) -> Self {
        Self {
            inner,
            healthy,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MembershipStore for FlakyFetchStore {
    async fn fetch_members(&self, group: &GroupKey) -> StorageResult<MemberSet> {
        if self.fetches.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            return Err(StorageError::unavailable("connection reset"));
        }
        self.inner.fetch_members(group).await
    }

    async fn begin(&self) -> StorageResult<Box<dyn MembershipTransaction>> {
        self.inner.begin().await
    }
}

/// Router wired to in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: InMemoryMembershipStore,
    pub profiles: Arc<MockProfiles>,
    pub shutdown: CancellationToken,
}

impl TestApp {
    pub fn new() -> Self {
        let store = InMemoryMembershipStore::new();
        Self::build(store.clone(), Arc::new(store))
    }

    /// Route membership reads and writes through `memberships` while the
    /// directory stays on `store`.
    pub fn build(store: InMemoryMembershipStore, memberships: Arc<dyn MembershipStore>) -> Self {
        init_test_logging();

        let profiles = Arc::new(MockProfiles::default());
        let profiles_dyn: Arc<dyn ProfileService> = profiles.clone();
        let coordinator: Arc<DynCoordinator> = Arc::new(ReconciliationCoordinator::new(
            memberships,
            RoleAttributeSynchronizer::new(profiles_dyn),
            RoleMapping::parse(MAPPING).unwrap(),
        ));
        let directory: Arc<dyn DirectoryStore> = Arc::new(store.clone());

        let shutdown = CancellationToken::new();
        let router = app_router(
            coordinator,
            directory,
            BasicCredentials::new(USER, PASSWORD),
            shutdown.clone(),
        );

        Self {
            router,
            store,
            profiles,
            shutdown,
        }
    }

    /// Register a profile in both the store and the directory.
    pub fn with_profile(self, id: &str, email: &str) -> Self {
        self.store.register_profile(id, email);
        self.profiles.set(id, Value::Null);
        self
    }
}

pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

/// Authenticated request with an optional JSON body.
pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic_auth(USER, PASSWORD));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/scim+json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
