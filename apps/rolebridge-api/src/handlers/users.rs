//! SCIM User handlers.
//!
//! Users are the employees group memberships point at. Okta provisions a user
//! before pushing it as a group member.

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use std::sync::Arc;

use rolebridge_core::{DirectoryStore, Employee, ProfileId, StorageError};

use crate::error::{ApiError, ApiResult};
use crate::handlers::{eq_filter_value, scim_response, ListQuery};
use crate::models::{ScimListResponse, ScimUser, ScimUserRequest};

fn user_not_found(id: &ProfileId) -> ApiError {
    ApiError::Storage(StorageError::not_found(format!("user {id}")))
}

/// Create a user, or reactivate an inactive one with the same `userName`.
///
/// POST /scim/v2/Users
pub async fn create_user(
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    body: Result<Json<ScimUserRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let external_id = request.external_id.as_deref().unwrap_or_default();
    if external_id.is_empty() {
        return Err(ApiError::BadRequest("externalId is required".to_string()));
    }
    if request.user_name.is_empty() {
        return Err(ApiError::BadRequest("userName is required".to_string()));
    }

    if let Some(existing) = directory.find_employee_by_email(&request.user_name).await? {
        if existing.active {
            return Err(ApiError::Storage(StorageError::conflict(format!(
                "user {} already exists",
                request.user_name
            ))));
        }
    }

    let employee = directory
        .upsert_employee(&Employee::new(
            external_id,
            request.name.full_name(),
            request.user_name.clone(),
        ))
        .await?;

    tracing::info!(user_id = %employee.id, "User provisioned");
    Ok(scim_response(StatusCode::CREATED, ScimUser::from(&employee)))
}

/// Get a user by its Okta id.
///
/// GET /scim/v2/Users/:id
pub async fn get_user(
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = ProfileId::new(id);
    let employee = directory
        .get_employee(&id)
        .await?
        .ok_or_else(|| user_not_found(&id))?;
    Ok(scim_response(StatusCode::OK, ScimUser::from(&employee)))
}

/// List users, or look one up with `filter=userName eq "..."`.
///
/// The filter only matches active users.
///
/// GET /scim/v2/Users
pub async fn list_users(
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    let (employees, start_index) = match query.filter.as_deref() {
        Some(filter) => {
            let user_name = eq_filter_value(filter, "userName")?;
            let found = directory
                .find_employee_by_email(user_name)
                .await?
                .filter(|e| e.active);
            (found.into_iter().collect::<Vec<_>>(), 1)
        }
        None => {
            let page = query.page();
            (directory.list_employees(page).await?, page.start_index())
        }
    };

    let users: Vec<ScimUser> = employees.iter().map(ScimUser::from).collect();
    Ok(scim_response(
        StatusCode::OK,
        ScimListResponse::new(users, start_index),
    ))
}

/// Replace a user's name, email and active flag.
///
/// PUT /scim/v2/Users/:id
pub async fn replace_user(
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Path(id): Path<String>,
    body: Result<Json<ScimUserRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = ProfileId::new(id);

    if directory.get_employee(&id).await?.is_none() {
        return Err(user_not_found(&id));
    }

    let employee = directory
        .upsert_employee(&Employee {
            id,
            name: request.name.full_name(),
            email: request.email().to_string(),
            active: request.active,
        })
        .await?;

    tracing::info!(user_id = %employee.id, active = employee.active, "User updated");
    Ok(scim_response(StatusCode::OK, ScimUser::from(&employee)))
}

/// Deactivate a user. Memberships are kept.
///
/// DELETE /scim/v2/Users/:id
pub async fn deactivate_user(
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = ProfileId::new(id);
    directory.deactivate_employee(&id).await?;
    tracing::info!(user_id = %id, "User deactivated");
    Ok(StatusCode::NO_CONTENT)
}
