//! HTTP request handlers.

pub mod groups;
pub mod health;
pub mod roles;
pub mod users;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use rolebridge_core::Page;

use crate::error::{ApiError, ApiResult};

/// SCIM content type.
pub const SCIM_CONTENT_TYPE: &str = "application/scim+json";

/// Build a SCIM response with the proper content type.
pub fn scim_response<T: serde::Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(SCIM_CONTENT_TYPE),
    );
    response
}

/// Query parameters of the list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub filter: Option<String>,
    pub start_index: Option<u32>,
    pub count: Option<u32>,
}

impl ListQuery {
    #[must_use]
    pub fn page(&self) -> Page {
        Page::from_start_index(self.start_index.unwrap_or(1), self.count.unwrap_or(0))
    }
}

/// Value of an `<attribute> eq "<value>"` filter.
///
/// Only that single form is understood; anything else is a bad request.
pub fn eq_filter_value<'a>(filter: &'a str, attribute: &str) -> ApiResult<&'a str> {
    filter
        .trim()
        .strip_prefix(attribute)
        .and_then(|rest| rest.trim_start().strip_prefix("eq "))
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('"'))
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "unsupported filter, expected {attribute} eq \"value\""
            ))
        })
}
