//! External role attribute synchronizer.
//!
//! Roles live in a single list-valued attribute on the external profile. Every
//! call is a fetch, an in-memory edit and a full write back. There is no
//! compare-and-swap, so two concurrent calls on the same profile can lose an
//! update.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{SyncError, SyncResult};
use crate::ids::ProfileId;
use crate::profile::ProfileService;

/// Profile attribute that holds the role list unless configured otherwise.
pub const DEFAULT_ROLE_ATTRIBUTE: &str = "twilioFlexUserRolesArray";

/// How a non-list attribute value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NonListValue {
    TreatAsEmpty,
    Reject,
}

/// Adds and removes single roles on an external profile attribute.
pub struct RoleAttributeSynchronizer<P: ProfileService + ?Sized> {
    profiles: Arc<P>,
    attribute: String,
}

impl<P: ProfileService + ?Sized> Clone for RoleAttributeSynchronizer<P> {
    fn clone(&self) -> Self {
        Self {
            profiles: Arc::clone(&self.profiles),
            attribute: self.attribute.clone(),
        }
    }
}

impl<P: ProfileService + ?Sized> RoleAttributeSynchronizer<P> {
    /// Create a synchronizer for [`DEFAULT_ROLE_ATTRIBUTE`].
    pub fn new(profiles: Arc<P>) -> Self {
        Self::with_attribute(profiles, DEFAULT_ROLE_ATTRIBUTE)
    }

    /// Create a synchronizer for a specific attribute.
    pub fn with_attribute(profiles: Arc<P>, attribute: impl Into<String>) -> Self {
        Self {
            profiles,
            attribute: attribute.into(),
        }
    }

    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Ensure `role` is present on the profile.
    ///
    /// A missing attribute, or one that is not a list, counts as empty. When
    /// the role is already present nothing is written.
    #[instrument(skip(self), fields(attribute = %self.attribute))]
    pub async fn add_role(&self, profile_id: &ProfileId, role: &str) -> SyncResult<()> {
        let mut roles = self.fetch_roles(profile_id, NonListValue::TreatAsEmpty).await?;

        if roles.iter().any(|r| r == role) {
            debug!("Role already present, skipping write");
            return Ok(());
        }

        roles.push(role.to_string());
        self.profiles
            .write_attribute(profile_id, &self.attribute, &roles)
            .await?;

        debug!(roles = roles.len(), "Role added");
        Ok(())
    }

    /// Ensure `role` is absent from the profile.
    ///
    /// Every occurrence is filtered out and the list is always written back,
    /// even when the role was not there.
    #[instrument(skip(self), fields(attribute = %self.attribute))]
    pub async fn remove_role(&self, profile_id: &ProfileId, role: &str) -> SyncResult<()> {
        let roles = self.fetch_roles(profile_id, NonListValue::Reject).await?;

        let remaining: Vec<String> = roles.into_iter().filter(|r| r != role).collect();
        self.profiles
            .write_attribute(profile_id, &self.attribute, &remaining)
            .await?;

        debug!(roles = remaining.len(), "Role removed");
        Ok(())
    }

    async fn fetch_roles(
        &self,
        profile_id: &ProfileId,
        non_list: NonListValue,
    ) -> SyncResult<Vec<String>> {
        let value = self
            .profiles
            .fetch_attribute(profile_id, &self.attribute)
            .await?;
        parse_roles(profile_id, &self.attribute, value, non_list)
    }
}

fn parse_roles(
    profile_id: &ProfileId,
    attribute: &str,
    value: Option<Value>,
    non_list: NonListValue,
) -> SyncResult<Vec<String>> {
    let format_error = |message: String| SyncError::AttributeFormat {
        profile_id: profile_id.clone(),
        attribute: attribute.to_string(),
        message,
    };

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::String(s) => Ok(s),
                other => Err(format_error(format!(
                    "entry {idx} is {} rather than a string",
                    json_type(&other)
                ))),
            })
            .collect(),
        Some(other) => match non_list {
            NonListValue::TreatAsEmpty => Ok(Vec::new()),
            NonListValue::Reject => Err(format_error(format!(
                "expected a list, found {}",
                json_type(&other)
            ))),
        },
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
