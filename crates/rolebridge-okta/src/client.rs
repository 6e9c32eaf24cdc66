//! Okta management API client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use url::Url;

use rolebridge_core::{ProfileId, ProfileService, SyncError, SyncResult};

use crate::config::OktaConfig;
use crate::error::{OktaError, OktaErrorBody, OktaResult};

/// Subset of an Okta user document.
#[derive(Debug, Deserialize)]
pub struct OktaUser {
    pub id: String,
    #[serde(default)]
    pub profile: Map<String, Value>,
}

/// [`ProfileService`] backed by the Okta users API.
///
/// Reads `GET /api/v1/users/{id}` and writes with a partial profile update
/// (`POST /api/v1/users/{id}`), so attributes other than the one written are
/// left alone.
#[derive(Debug, Clone)]
pub struct OktaProfileClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl OktaProfileClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the HTTP client cannot be
    /// created.
    pub fn new(config: &OktaConfig) -> OktaResult<Self> {
        let base_url = config.validate()?;

        let mut auth = HeaderValue::from_str(&format!("SSWS {}", config.api_token))
            .map_err(|e| OktaError::Config(format!("Invalid API token: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| OktaError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn user_url(&self, id: &ProfileId) -> OktaResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| OktaError::Config("org_url cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "users", id.as_str()]);
        Ok(url)
    }

    /// Fetch a user document.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &ProfileId) -> OktaResult<OktaUser> {
        let response = self.http_client.get(self.user_url(id)?).send().await?;
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(OktaError::from);
        }

        let body = response.text().await.unwrap_or_default();
        Err(OktaErrorBody::into_error(status.as_u16(), &body))
    }

    /// Replace one profile attribute, leaving the rest of the profile intact.
    #[instrument(skip(self, value))]
    pub async fn update_profile_attribute(
        &self,
        id: &ProfileId,
        attribute: &str,
        value: Value,
    ) -> OktaResult<()> {
        let mut profile = Map::new();
        profile.insert(attribute.to_string(), value);
        let body = json!({ "profile": profile });
        let response = self
            .http_client
            .post(self.user_url(id)?)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            debug!(status = status.as_u16(), "Profile updated");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(OktaErrorBody::into_error(status.as_u16(), &body))
    }
}

#[async_trait]
impl ProfileService for OktaProfileClient {
    async fn fetch_attribute(
        &self,
        profile_id: &ProfileId,
        attribute: &str,
    ) -> SyncResult<Option<Value>> {
        let mut user = self
            .get_user(profile_id)
            .await
            .map_err(|e| SyncError::ProfileFetch {
                profile_id: profile_id.clone(),
                message: e.to_string(),
            })?;

        Ok(user.profile.remove(attribute).filter(|v| !v.is_null()))
    }

    async fn write_attribute(
        &self,
        profile_id: &ProfileId,
        attribute: &str,
        values: &[String],
    ) -> SyncResult<()> {
        self.update_profile_attribute(profile_id, attribute, Value::from(values.to_vec()))
            .await
            .map_err(|e| SyncError::ProfilePersist {
                profile_id: profile_id.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_url_appends_segments() {
        let client =
            OktaProfileClient::new(&OktaConfig::new("https://example.okta.com/", "t")).unwrap();
        let url = client.user_url(&ProfileId::new("00u1abcd")).unwrap();
        assert_eq!(url.as_str(), "https://example.okta.com/api/v1/users/00u1abcd");
    }

    #[test]
    fn test_user_url_escapes_id() {
        let client =
            OktaProfileClient::new(&OktaConfig::new("https://example.okta.com", "t")).unwrap();
        let url = client.user_url(&ProfileId::new("a/b")).unwrap();
        assert_eq!(url.as_str(), "https://example.okta.com/api/v1/users/a%2Fb");
    }
}
