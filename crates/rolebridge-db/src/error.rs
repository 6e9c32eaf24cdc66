//! Error types for the rolebridge-db crate.
//!
//! Setup failures (connecting, migrating) are [`DbError`]s. Failures of store
//! operations are classified into the engine's [`StorageError`] by
//! [`map_sqlx_error`].

use rolebridge_core::StorageError;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database setup errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish a connection pool.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error indicates a migration problem.
    #[must_use]
    pub fn is_migration_error(&self) -> bool {
        matches!(self, DbError::MigrationFailed(_))
    }
}

/// Classify a sqlx error raised by a store operation.
///
/// - unique violation: [`StorageError::Conflict`]
/// - foreign-key violation or missing row: [`StorageError::NotFound`]
/// - everything else (pool, I/O, timeouts, protocol): [`StorageError::Unavailable`]
pub fn map_sqlx_error(context: &str, err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation => {
                StorageError::conflict(format!("{context}: {}", db_err.message()))
            }
            ErrorKind::ForeignKeyViolation => {
                StorageError::not_found(format!("{context}: {}", db_err.message()))
            }
            _ => StorageError::unavailable(format!("{context}: {err}")),
        },
        sqlx::Error::RowNotFound => StorageError::not_found(context.to_string()),
        _ => StorageError::unavailable(format!("{context}: {err}")),
    }
}
