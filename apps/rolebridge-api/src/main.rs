//! rolebridge HTTP service.
//!
//! Provisions SCIM users, reconciles SCIM group pushes into the membership
//! database and mirrors roles onto Okta user profiles.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rolebridge_api::{app_router, ApiConfig, BasicCredentials, DynCoordinator};
use rolebridge_core::{
    DirectoryStore, MembershipStore, ProfileService, ReconciliationCoordinator,
    RoleAttributeSynchronizer,
};
use rolebridge_db::{run_migrations, PgMembershipStore};
use rolebridge_okta::{OktaConfig, OktaProfileClient};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rolebridge=debug")),
        )
        .init();

    let config = ApiConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    info!(
        listen_addr = %config.listen_addr,
        role_attribute = %config.role_attribute,
        mapped_groups = config.role_mapping.len(),
        "Starting rolebridge"
    );

    let store = PgMembershipStore::connect(&config.database_url, config.database_max_connections)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Failed to connect to database: {e}");
            std::process::exit(1);
        });

    if let Err(e) = run_migrations(&store).await {
        eprintln!("Failed to run migrations: {e}");
        std::process::exit(1);
    }

    let okta_config = OktaConfig::new(&config.okta_org_url, &config.okta_api_token)
        .with_timeout(config.okta_timeout);
    let okta = OktaProfileClient::new(&okta_config).unwrap_or_else(|e| {
        eprintln!("Invalid Okta configuration: {e}");
        std::process::exit(1);
    });

    let directory: Arc<dyn DirectoryStore> = Arc::new(store.clone());
    let store: Arc<dyn MembershipStore> = Arc::new(store);
    let profiles: Arc<dyn ProfileService> = Arc::new(okta);
    let coordinator: Arc<DynCoordinator> = Arc::new(ReconciliationCoordinator::new(
        store,
        RoleAttributeSynchronizer::with_attribute(profiles, config.role_attribute.clone()),
        config.role_mapping.clone(),
    ));

    let shutdown = CancellationToken::new();
    let app = app_router(
        coordinator,
        directory,
        BasicCredentials::new(&config.basic_user, &config.basic_password),
        shutdown.clone(),
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Failed to bind {}: {e}", config.listen_addr);
            std::process::exit(1);
        });

    info!(addr = %config.listen_addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
    {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Shutdown complete");
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received, cancelling in-flight reconciliations");
    shutdown.cancel();
}
