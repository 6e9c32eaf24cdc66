//! Database migration management.

use crate::error::DbError;
use crate::store::PgMembershipStore;

/// Run all pending database migrations.
///
/// Migrations are embedded at compile time from the `migrations/` directory.
///
/// # Errors
///
/// Returns `DbError::MigrationFailed` if any migration fails to apply.
pub async fn run_migrations(store: &PgMembershipStore) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(store.pool())
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}
