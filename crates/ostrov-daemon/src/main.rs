//! Ostrov daemon - process bootstrap
//!
//! Loads configuration from the environment, opens the database pool,
//! verifies it and holds it until Ctrl+C.

use anyhow::{Context, Result};
use tracing::info;

use ostrov_config::Config;
use ostrov_db::{Database, DatabaseAccess};

#[tokio::main]
async fn main() -> Result<()> {
    ostrov_obs::init("ostrovd");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Loaded configuration: {:?}", config);

    let mut db = Database::new(config);
    db.connect()
        .await
        .context("Failed to connect to database")?;
    db.ping().await.context("Database ping failed")?;
    info!(port = db.config().port, "Database connection verified");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    db.close().await.context("Failed to close database")?;
    info!("Ostrov daemon stopped");
    Ok(())
}
