//! # rolebridge-db
//!
//! `PostgreSQL` implementation of [`rolebridge_core::MembershipStore`] and
//! [`rolebridge_core::DirectoryStore`].
//!
//! ## Tables
//!
//! - `employees` - directory profiles keyed by `okta_id`
//! - `okta_groups` - groups keyed by `name`, bound to at most one `okta_id`
//! - `employee_okta_groups` - membership, primary key on (profile, group)
//!
//! Every membership change of one reconciliation runs in a single database
//! transaction; dropping an uncommitted [`PgMembershipTransaction`] rolls it
//! back.

pub mod directory;
pub mod error;
pub mod migrations;
pub mod store;

pub use error::{map_sqlx_error, DbError};
pub use migrations::run_migrations;
pub use store::{PgMembershipStore, PgMembershipTransaction};
