//! Okta client configuration.

use std::time::Duration;
use url::Url;

use crate::error::{OktaError, OktaResult};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for an Okta org.
#[derive(Clone)]
pub struct OktaConfig {
    /// Org base URL, e.g. `https://example.okta.com`.
    pub org_url: String,
    /// API token sent as `SSWS <token>`.
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for OktaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OktaConfig")
            .field("org_url", &self.org_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OktaConfig {
    /// Create a config with the default timeout.
    pub fn new(org_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            org_url: org_url.into(),
            api_token: api_token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the config and return the parsed org URL.
    pub fn validate(&self) -> OktaResult<Url> {
        if self.api_token.trim().is_empty() {
            return Err(OktaError::Config("api_token is required".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(OktaError::Config("timeout must be positive".to_string()));
        }

        let url = Url::parse(&self.org_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OktaError::Config(format!(
                "org_url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() {
            return Err(OktaError::Config(format!(
                "org_url '{}' cannot be used as a base URL",
                self.org_url
            )));
        }
        Ok(url)
    }
}
