//! HTTP basic authentication middleware.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower::{Layer, Service};

use crate::error::ApiError;

/// Expected basic auth credentials.
#[derive(Clone)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check an `Authorization` header against these credentials.
    #[must_use]
    pub fn verify(&self, header: Option<&HeaderValue>) -> bool {
        let Some(encoded) = header
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((user, password)) = decoded.split_once(':') else {
            return false;
        };

        // SECURITY: both parts are compared in constant time and combined
        // without short-circuiting.
        let user_ok = user.as_bytes().ct_eq(self.username.as_bytes());
        let password_ok = password.as_bytes().ct_eq(self.password.as_bytes());
        (user_ok & password_ok).into()
    }
}

/// Layer for HTTP basic authentication.
#[derive(Clone)]
pub struct BasicAuthLayer {
    credentials: Arc<BasicCredentials>,
}

impl BasicAuthLayer {
    #[must_use]
    pub fn new(credentials: BasicCredentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
        }
    }
}

impl<S> Layer<S> for BasicAuthLayer {
    type Service = BasicAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BasicAuthService {
            inner,
            credentials: Arc::clone(&self.credentials),
        }
    }
}

/// Basic authentication service wrapper.
#[derive(Clone)]
pub struct BasicAuthService<S> {
    inner: S,
    credentials: Arc<BasicCredentials>,
}

impl<S> Service<Request<Body>> for BasicAuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);
        let authorized = self
            .credentials
            .verify(req.headers().get(header::AUTHORIZATION));

        Box::pin(async move {
            if !authorized {
                tracing::debug!(path = %req.uri().path(), "Rejected request without valid credentials");
                return Ok(ApiError::Unauthorized.into_response());
            }
            inner.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, password: &str) -> HeaderValue {
        let encoded = STANDARD.encode(format!("{user}:{password}"));
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
    }

    #[test]
    fn test_verify_accepts_matching_credentials() {
        let creds = BasicCredentials::new("okta", "s3cret");
        assert!(creds.verify(Some(&basic("okta", "s3cret"))));
    }

    #[test]
    fn test_verify_allows_colon_in_password() {
        let creds = BasicCredentials::new("okta", "a:b");
        assert!(creds.verify(Some(&basic("okta", "a:b"))));
    }

    #[test]
    fn test_verify_rejects_bad_input() {
        let creds = BasicCredentials::new("okta", "s3cret");
        assert!(!creds.verify(None));
        assert!(!creds.verify(Some(&basic("okta", "wrong"))));
        assert!(!creds.verify(Some(&basic("other", "s3cret"))));
        assert!(!creds.verify(Some(&HeaderValue::from_static("Bearer abc"))));
        assert!(!creds.verify(Some(&HeaderValue::from_static("Basic !!!"))));
    }

    #[test]
    fn test_verify_rejects_prefix_and_length_mismatch() {
        let creds = BasicCredentials::new("okta", "s3cret");
        assert!(!creds.verify(Some(&basic("okta", "s3cre"))));
        assert!(!creds.verify(Some(&basic("okta", "s3cret!"))));
        assert!(!creds.verify(Some(&basic("okt", "s3cret"))));
        assert!(!creds.verify(Some(&basic("", ""))));
    }
}
