//! Error types for the Okta client.

use serde::Deserialize;
use thiserror::Error;

/// Result type alias using `OktaError`.
pub type OktaResult<T> = Result<T, OktaError>;

/// Errors raised while building or talking to the Okta API.
#[derive(Debug, Error)]
pub enum OktaError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Okta answered with a non-success status.
    #[error("Okta API error: {status} {code} - {summary}")]
    Api {
        status: u16,
        code: String,
        summary: String,
    },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl OktaError {
    /// Whether the API reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, OktaError::Api { status: 404, .. })
    }
}

/// Error body returned by the Okta management API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OktaErrorBody {
    pub error_code: String,
    pub error_summary: String,
}

impl OktaErrorBody {
    /// Build an [`OktaError::Api`] from a status and raw body.
    ///
    /// Bodies that are not Okta error documents are kept verbatim.
    #[must_use]
    pub fn into_error(status: u16, body: &str) -> OktaError {
        match serde_json::from_str::<OktaErrorBody>(body) {
            Ok(parsed) => OktaError::Api {
                status,
                code: parsed.error_code,
                summary: parsed.error_summary,
            },
            Err(_) => OktaError::Api {
                status,
                code: status.to_string(),
                summary: body.to_string(),
            },
        }
    }
}
