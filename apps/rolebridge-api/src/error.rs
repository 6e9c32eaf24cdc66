//! API errors rendered as SCIM error documents (RFC 7644 Section 3.12).

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rolebridge_core::{GroupKey, ProfileId, ReconcileError, StorageError, SyncError};

/// SCIM error types used by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScimErrorType {
    /// Uniqueness constraint violated
    Uniqueness,
    /// Request syntax is invalid
    InvalidSyntax,
    /// Target resource not found for operation
    NoTarget,
    /// Attribute value is invalid
    InvalidValue,
}

impl std::fmt::Display for ScimErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScimErrorType::Uniqueness => "uniqueness",
            ScimErrorType::InvalidSyntax => "invalidSyntax",
            ScimErrorType::NoTarget => "noTarget",
            ScimErrorType::InvalidValue => "invalidValue",
        };
        write!(f, "{s}")
    }
}

/// SCIM error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    /// Always ["urn:ietf:params:scim:api:messages:2.0:Error"]
    pub schemas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,
    pub detail: String,
    /// HTTP status code as string
    pub status: String,
    /// Profiles whose external roles are stale after a partial reconciliation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_profiles: Vec<String>,
}

impl ScimErrorResponse {
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:Error";

    pub fn new(
        status: StatusCode,
        detail: impl Into<String>,
        scim_type: Option<ScimErrorType>,
    ) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            scim_type: scim_type.map(|t| t.to_string()),
            detail: detail.into(),
            status: status.as_u16().to_string(),
            failed_profiles: Vec::new(),
        }
    }
}

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong basic credentials
    #[error("Authentication required")]
    Unauthorized,

    /// Invalid request syntax
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Store failure; nothing was changed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// External profile failure on a single-role request
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Local membership committed, external roles not fully mirrored
    #[error("Membership of {group} was committed but external roles are out of date: {cause}")]
    PartiallyApplied {
        group: GroupKey,
        failed_profiles: Vec<ProfileId>,
        cause: ReconcileError,
    },

    /// Request cancelled (service shutting down)
    #[error("Request cancelled: {0}")]
    Cancelled(String),
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Storage(e) => ApiError::Storage(e),
            ReconcileError::Sync(e) => ApiError::Sync(e),
            ReconcileError::Cancelled { stage } => ApiError::Cancelled(stage.to_string()),
        }
    }
}

impl ApiError {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::Conflict { .. }) => StatusCode::CONFLICT,
            ApiError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Sync(SyncError::AttributeFormat { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Sync(_) | ApiError::PartiallyApplied { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the SCIM error type for this error
    #[must_use]
    pub fn scim_type(&self) -> Option<ScimErrorType> {
        match self {
            ApiError::BadRequest(_) => Some(ScimErrorType::InvalidSyntax),
            ApiError::Storage(StorageError::Conflict { .. }) => Some(ScimErrorType::Uniqueness),
            ApiError::Storage(StorageError::NotFound { .. }) => Some(ScimErrorType::NoTarget),
            ApiError::Sync(SyncError::AttributeFormat { .. }) => Some(ScimErrorType::InvalidValue),
            _ => None,
        }
    }

    /// Convert to SCIM error response
    #[must_use]
    pub fn to_response(&self) -> ScimErrorResponse {
        let mut body = ScimErrorResponse::new(self.status_code(), self.to_string(), self.scim_type());
        if let ApiError::PartiallyApplied {
            failed_profiles, ..
        } = self
        {
            body.failed_profiles = failed_profiles.iter().map(ToString::to_string).collect();
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        }

        let mut response = (status, Json(self.to_response())).into_response();

        if matches!(self, ApiError::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="rolebridge""#),
            );
        }

        // Set SCIM content type
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/scim+json"),
        );

        response
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
