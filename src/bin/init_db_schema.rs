use dotenvy::dotenv;
use eyre::Result;
use tracing::info;

use position_snapshot_pipeline::config;
use position_snapshot_pipeline::db::{connection, schema};
use position_snapshot_pipeline::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    // Load configuration
    let cfg = config::Config::load();
    info!(network = %cfg.network, "Configuration loaded and logging initialized");

    // Initialize database connection pool
    let pool = connection::create_pool(&cfg).await?;
    info!("Database connection pool created");

    // Initialize database schema
    schema::init_schema(&pool, &cfg.snapshot_table).await?;
    info!(table = %cfg.snapshot_table, "Database schema initialized");

    tokio::time::sleep(std::time::Duration::from_secs(3)).await; // Allow time for logging to flush
    Ok(())
}
