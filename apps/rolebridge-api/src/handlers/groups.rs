//! SCIM Group handlers.
//!
//! PUT and PATCH both carry the complete desired membership and are
//! reconciled with full-replace semantics. The path id is the Okta group id
//! and is bound to the group named by `displayName`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use rolebridge_core::{
    DirectoryStore, GroupKey, GroupRecord, Member, MemberSet, ReconciliationOutcome,
    ReconciliationStatus, StorageError,
};

use crate::error::{ApiError, ApiResult};
use crate::handlers::{eq_filter_value, scim_response, ListQuery};
use crate::models::{ScimGroup, ScimGroupRequest, ScimListResponse};
use crate::router::DynCoordinator;

/// Validate the group name and the requested members.
///
/// The name is used verbatim as the group key.
fn desired_state(request: ScimGroupRequest) -> ApiResult<(GroupKey, MemberSet)> {
    let group = GroupKey::new(request.display_name);
    if group.is_empty() {
        return Err(ApiError::BadRequest("displayName is required".to_string()));
    }
    let desired = MemberSet::from_requested(request.members.into_iter().map(Member::from));
    Ok((group, desired))
}

fn group_not_found(id: &str) -> ApiError {
    ApiError::Storage(StorageError::not_found(format!("group {id}")))
}

/// Turn a failed or partial outcome into the matching error.
fn check_outcome(outcome: ReconciliationOutcome) -> ApiResult<()> {
    match (outcome.status(), outcome.error) {
        (ReconciliationStatus::PartiallyApplied, Some(cause)) => Err(ApiError::PartiallyApplied {
            group: outcome.group,
            failed_profiles: outcome.failed_profiles,
            cause,
        }),
        (ReconciliationStatus::Failed, Some(err)) => Err(err.into()),
        _ => Ok(()),
    }
}

async fn to_scim_group(coordinator: &DynCoordinator, record: &GroupRecord) -> ApiResult<ScimGroup> {
    let members = coordinator.members(&record.name).await?;
    Ok(ScimGroup::from_members(
        record.external_id.clone().unwrap_or_default(),
        &record.name,
        &members,
    ))
}

/// Create a group with its initial members.
///
/// POST /scim/v2/Groups
pub async fn create_group(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Extension(shutdown): Extension<CancellationToken>,
    body: Result<Json<ScimGroupRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (group, desired) = desired_state(request)?;

    if directory.find_group_by_name(&group).await?.is_some() {
        return Err(ApiError::Storage(StorageError::conflict(format!(
            "group {group} already exists"
        ))));
    }

    let id = Uuid::new_v4().to_string();
    directory.create_group(&group, &id).await?;
    tracing::info!(group = %group, resource_id = %id, "Group created");

    let outcome = coordinator
        .reconcile(&group, desired.clone(), &shutdown.child_token())
        .await;
    check_outcome(outcome)?;

    Ok(scim_response(
        StatusCode::CREATED,
        ScimGroup::from_members(id, &group, &desired),
    ))
}

/// Get a group by its Okta id.
///
/// GET /scim/v2/Groups/:id
pub async fn get_group(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let record = directory
        .find_group(&id)
        .await?
        .ok_or_else(|| group_not_found(&id))?;
    Ok(scim_response(
        StatusCode::OK,
        to_scim_group(&coordinator, &record).await?,
    ))
}

/// List groups, or look one up with `filter=displayName eq "..."`.
///
/// GET /scim/v2/Groups
pub async fn list_groups(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    let (records, start_index) = match query.filter.as_deref() {
        Some(filter) => {
            let name = GroupKey::new(eq_filter_value(filter, "displayName")?);
            let found = directory.find_group_by_name(&name).await?;
            (found.into_iter().collect::<Vec<_>>(), 1)
        }
        None => {
            let page = query.page();
            (directory.list_groups(page).await?, page.start_index())
        }
    };

    let mut groups = Vec::with_capacity(records.len());
    for record in &records {
        groups.push(to_scim_group(&coordinator, record).await?);
    }
    Ok(scim_response(
        StatusCode::OK,
        ScimListResponse::new(groups, start_index),
    ))
}

/// Replace the membership of a group.
///
/// PUT /scim/v2/Groups/:id
pub async fn replace_group(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Extension(shutdown): Extension<CancellationToken>,
    Path(id): Path<String>,
    body: Result<Json<ScimGroupRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    reconcile_group(&coordinator, directory.as_ref(), &shutdown, id, request).await
}

/// Update the membership of a group.
///
/// PATCH /scim/v2/Groups/:id
pub async fn update_group(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Extension(shutdown): Extension<CancellationToken>,
    Path(id): Path<String>,
    body: Result<Json<ScimGroupRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    reconcile_group(&coordinator, directory.as_ref(), &shutdown, id, request).await
}

async fn reconcile_group(
    coordinator: &DynCoordinator,
    directory: &dyn DirectoryStore,
    shutdown: &CancellationToken,
    id: String,
    request: ScimGroupRequest,
) -> ApiResult<Response> {
    let requested = request.members.len();
    let (group, desired) = desired_state(request)?;

    tracing::debug!(
        group = %group,
        resource_id = %id,
        requested,
        "Reconciling group membership"
    );

    directory.bind_group(&group, &id).await?;

    let outcome = coordinator
        .reconcile(&group, desired.clone(), &shutdown.child_token())
        .await;
    check_outcome(outcome)?;

    // The committed membership is exactly the desired set.
    Ok(scim_response(
        StatusCode::OK,
        ScimGroup::from_members(id, &group, &desired),
    ))
}

/// Delete a group: remove every member, revoke their role, drop the group.
///
/// DELETE /scim/v2/Groups/:id
pub async fn delete_group(
    Extension(coordinator): Extension<Arc<DynCoordinator>>,
    Extension(directory): Extension<Arc<dyn DirectoryStore>>,
    Extension(shutdown): Extension<CancellationToken>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let record = directory
        .find_group(&id)
        .await?
        .ok_or_else(|| group_not_found(&id))?;

    let outcome = coordinator
        .dissolve(&record.name, &shutdown.child_token())
        .await;
    check_outcome(outcome)?;

    tracing::info!(group = %record.name, resource_id = %id, "Group deleted");
    Ok(StatusCode::NO_CONTENT)
}
