//! # Rosters API Main Entry Point
//!
//! This is the main entry point for the Rosters API service.

use rosters::{
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    server::run_server,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    run_migrations(&db).await?;

    run_server(config, db).await
}
