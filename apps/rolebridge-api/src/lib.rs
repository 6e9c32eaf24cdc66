//! # rolebridge API
//!
//! SCIM-style HTTP front end for membership reconciliation. Okta provisions
//! users and pushes the desired members of a group; the service commits the
//! membership locally and mirrors the mapped role onto each affected Okta
//! profile.
//!
//! ## Endpoints
//!
//! - `GET|POST /scim/v2/Users`, `GET|PUT|DELETE /scim/v2/Users/:id` - Employees
//! - `GET|POST /scim/v2/Groups` - List and create groups
//! - `PUT|PATCH /scim/v2/Groups/:id` - Full-replace group reconciliation
//! - `GET|DELETE /scim/v2/Groups/:id` - Read or dissolve a group
//! - `PUT|DELETE /roles/:profile_id/:role` - Single role grant/revoke
//! - `GET /health` - Liveness check
//!
//! Everything except `/health` requires HTTP basic authentication.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;

pub use auth::{BasicAuthLayer, BasicCredentials};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ScimErrorResponse, ScimErrorType};
pub use models::{
    ScimEmail, ScimGroup, ScimGroupMember, ScimGroupRequest, ScimListResponse, ScimName, ScimUser,
    ScimUserRequest,
};
pub use router::{app_router, DynCoordinator};
