//! Service configuration loaded from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use rolebridge_core::{RoleMapping, DEFAULT_ROLE_ATTRIBUTE};

/// Configuration for the rolebridge HTTP service.
#[derive(Clone)]
pub struct ApiConfig {
    /// Listen address for the HTTP server.
    pub listen_addr: SocketAddr,

    /// Database connection URL.
    pub database_url: String,

    /// Maximum pooled database connections.
    pub database_max_connections: u32,

    /// Basic auth user expected on every protected route.
    pub basic_user: String,

    /// Basic auth password expected on every protected route.
    pub basic_password: String,

    /// Okta org base URL.
    pub okta_org_url: String,

    /// Okta API token.
    pub okta_api_token: String,

    /// Timeout for a single Okta request.
    pub okta_timeout: Duration,

    /// Profile attribute holding the role list.
    pub role_attribute: String,

    /// Which group grants which external role.
    pub role_mapping: RoleMapping,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("listen_addr", &self.listen_addr)
            .field("database_url", &"[REDACTED]")
            .field("database_max_connections", &self.database_max_connections)
            .field("basic_user", &self.basic_user)
            .field("basic_password", &"[REDACTED]")
            .field("okta_org_url", &self.okta_org_url)
            .field("okta_api_token", &"[REDACTED]")
            .field("okta_timeout", &self.okta_timeout)
            .field("role_attribute", &self.role_attribute)
            .field("role_mapping", &self.role_mapping.len())
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let required = |key: &str| {
            reader(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.into()))
        };

        let listen_addr = reader("ROLEBRIDGE_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::InvalidValue("ROLEBRIDGE_LISTEN_ADDR".into(), e.to_string())
            })?;

        let database_url = required("DATABASE_URL")?;

        let database_max_connections = reader("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DATABASE_MAX_CONNECTIONS".into(),
                    "expected a positive integer".into(),
                )
            })?;

        let basic_user = required("SCIM_BASIC_USER")?;
        let basic_password = required("SCIM_BASIC_PASSWORD")?;
        let okta_org_url = required("OKTA_ORG_URL")?;
        let okta_api_token = required("OKTA_API_TOKEN")?;

        let okta_timeout_secs = reader("OKTA_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "OKTA_TIMEOUT_SECS".into(),
                    "expected a positive number of seconds".into(),
                )
            })?;

        let role_attribute = reader("ROLE_ATTRIBUTE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE_ATTRIBUTE.to_string());

        let role_mapping = RoleMapping::parse(&reader("ROLE_MAPPING").unwrap_or_default())
            .map_err(|e| ConfigError::InvalidValue("ROLE_MAPPING".into(), e.to_string()))?;

        Ok(Self {
            listen_addr,
            database_url,
            database_max_connections,
            basic_user,
            basic_password,
            okta_org_url,
            okta_api_token,
            okta_timeout: Duration::from_secs(okta_timeout_secs),
            role_attribute,
            role_mapping,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
