//! HTTP router configuration.

use axum::{
    routing::{get, put},
    Extension, Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use rolebridge_core::{DirectoryStore, MembershipStore, ProfileService, ReconciliationCoordinator};

use crate::auth::{BasicAuthLayer, BasicCredentials};
use crate::handlers::{groups, health, roles, users};

/// Coordinator over type-erased collaborators, as shared by the handlers.
pub type DynCoordinator = ReconciliationCoordinator<dyn MembershipStore, dyn ProfileService>;

/// Build the application router.
///
/// - GET/POST /scim/v2/Users, GET/PUT/DELETE /scim/v2/Users/:id
/// - GET/POST /scim/v2/Groups, GET/PUT/PATCH/DELETE /scim/v2/Groups/:id
/// - PUT/DELETE /roles/:profile_id/:role
/// - GET /health (no authentication)
///
/// Cancelling `shutdown` cancels in-flight reconciliations.
pub fn app_router(
    coordinator: Arc<DynCoordinator>,
    directory: Arc<dyn DirectoryStore>,
    credentials: BasicCredentials,
    shutdown: CancellationToken,
) -> Router {
    let protected = Router::new()
        .route(
            "/scim/v2/Users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/scim/v2/Users/:id",
            get(users::get_user)
                .put(users::replace_user)
                .delete(users::deactivate_user),
        )
        .route(
            "/scim/v2/Groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route(
            "/scim/v2/Groups/:id",
            get(groups::get_group)
                .put(groups::replace_group)
                .patch(groups::update_group)
                .delete(groups::delete_group),
        )
        .route(
            "/roles/:profile_id/:role",
            put(roles::grant_role).delete(roles::revoke_role),
        )
        .layer(BasicAuthLayer::new(credentials));

    Router::new()
        .route("/health", get(health::health))
        .merge(protected)
        .layer(Extension(coordinator))
        .layer(Extension(directory))
        .layer(Extension(shutdown))
        .layer(TraceLayer::new_for_http())
}
