//! Single-role grant and revoke on an external profile.

use axum::{extract::Path, http::StatusCode, Extension};
use std::sync::Arc;

use rolebridge_core::ProfileId;

use crate::error::{ApiError, ApiResult};
use crate::router::DynCoordinator;

fn validate(profile_id: &str, role: &str) -> ApiResult<ProfileId> {
    if profile_id.trim().is_empty() || role.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "profile id and role must not be empty".to_string(),
        ));
    }
    Ok(ProfileId::new(profile_id))
}

/// Grant a role.
///
/// PUT /roles/:profile_id/:role
pub async fn grant_role(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Path((profile_id, role)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let profile_id = validate(&profile_id, &role)?;
    coordinator.add_role(&profile_id, &role).await?;
    tracing::info!(profile_id = %profile_id, role = %role, "Role granted");
    Ok(StatusCode::NO_CONTENT)
}

/// Revoke a role.
///
/// DELETE /roles/:profile_id/:role
pub async fn revoke_role(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Path((profile_id, role)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let profile_id = validate(&profile_id, &role)?;
    coordinator.remove_role(&profile_id, &role).await?;
    tracing::info!(profile_id = %profile_id, role = %role, "Role revoked");
    Ok(StatusCode::NO_CONTENT)
}
