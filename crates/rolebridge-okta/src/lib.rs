//! # Okta Profile Client
//!
//! [`rolebridge_core::ProfileService`] implementation over the Okta users API.
//! Authenticates with an API token (`Authorization: SSWS <token>`).
//!
//! ```ignore
//! use rolebridge_okta::{OktaConfig, OktaProfileClient};
//!
//! let client = OktaProfileClient::new(&OktaConfig::new("https://example.okta.com", token))?;
//! let roles = client.fetch_attribute(&profile_id, "twilioFlexUserRolesArray").await?;
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{OktaProfileClient, OktaUser};
pub use config::{OktaConfig, DEFAULT_TIMEOUT};
pub use error::{OktaError, OktaResult};
