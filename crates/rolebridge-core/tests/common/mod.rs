//! Shared test helpers for rolebridge-core.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use rolebridge_core::{ProfileId, ProfileService, SyncError, SyncResult};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Profile service keeping one attribute value per profile in memory.
///
/// Profiles must be registered before use; an unregistered profile behaves
/// like a profile the directory does not know.
#[derive(Default)]
pub struct MockProfileService {
    attributes: Mutex<HashMap<ProfileId, Value>>,
    fail_fetch: Mutex<HashSet<ProfileId>>,
    fail_write: Mutex<HashSet<ProfileId>>,
    delay: Option<Duration>,
    fetch_call_count: AtomicUsize,
    write_call_count: AtomicUsize,
}

impl MockProfileService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register a profile whose role attribute is unset.
    pub fn with_profile(self, id: &str) -> Self {
        self.set_attribute(id, Value::Null);
        self
    }

    /// Register a profile with a raw attribute value.
    pub fn with_attribute(self, id: &str, value: Value) -> Self {
        self.set_attribute(id, value);
        self
    }

    pub fn set_attribute(&self, id: &str, value: Value) {
        self.attributes
            .lock()
            .unwrap()
            .insert(ProfileId::new(id), value);
    }

    pub fn fail_fetch_for(&self, id: &str) {
        self.fail_fetch.lock().unwrap().insert(ProfileId::new(id));
    }

    pub fn fail_write_for(&self, id: &str) {
        self.fail_write.lock().unwrap().insert(ProfileId::new(id));
    }

    pub fn clear_failures(&self) {
        self.fail_fetch.lock().unwrap().clear();
        self.fail_write.lock().unwrap().clear();
    }

    /// Current attribute value, `Null` when unset or unknown.
    pub fn attribute(&self, id: &str) -> Value {
        self.attributes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_call_count.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.fetch_calls() + self.write_calls()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProfileService for MockProfileService {
    async fn fetch_attribute(
        &self,
        profile_id: &ProfileId,
        _attribute: &str,
    ) -> SyncResult<Option<Value>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.fail_fetch.lock().unwrap().contains(profile_id) {
            return Err(SyncError::ProfileFetch {
                profile_id: profile_id.clone(),
                message: "connection refused".to_string(),
            });
        }

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
        self.pause().await;

        if self.fail_write.lock().unwrap().contains(profile_id) {
            return Err(SyncError::ProfilePersist {
                profile_id: profile_id.clone(),
                message: "503 Service Unavailable".to_string(),
            });
        }

        let mut attributes = self.attributes.lock().unwrap();
        match attributes.get_mut(profile_id) {
            None => Err(SyncError::ProfilePersist {
                profile_id: profile_id.clone(),
                message: "profile not found".to_string(),
            }),
            Some(slot) => {
                *slot = Value::from(values.to_vec());
                Ok(())
            }
        }
    }
}
