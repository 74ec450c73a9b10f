use position_snapshot_pipeline::chain::rpc::{ChainRpc, EndpointPool, EthersRpc};
use position_snapshot_pipeline::config;
use position_snapshot_pipeline::db;
use position_snapshot_pipeline::driver::{DriverConfig, PositionSource, TimeWindowDriver};
use position_snapshot_pipeline::logging;
use position_snapshot_pipeline::oracle::loader::HttpAttestationClient;
use position_snapshot_pipeline::positions::registry;

use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    // Load configuration
    let cfg = config::Config::load();
    info!(
        network = %cfg.network,
        start_ms = cfg.start_timestamp_ms,
        end_ms = cfg.end_timestamp_ms,
        step_ms = cfg.step_interval_ms,
        "Configuration loaded and logging initialized"
    );

    // Initialize database pool and make sure the output table exists
    let db_pool = db::connection::create_pool(&cfg).await?;
    db::schema::init_schema(&db_pool, &cfg.snapshot_table).await?;
    let store = Arc::new(db::store::PgSnapshotStore::new(
        db_pool,
        cfg.snapshot_table.clone(),
    ));
    info!(table = %cfg.snapshot_table, "Snapshot store initialized");

    // Build the RPC endpoint pool
    let call_timeout = Duration::from_millis(cfg.rpc_call_timeout_ms);
    let mut clients: Vec<Arc<dyn ChainRpc>> = Vec::with_capacity(cfg.rpc_urls.len());
    for url in &cfg.rpc_urls {
        clients.push(Arc::new(EthersRpc::connect(url, call_timeout)?));
    }
    let pool = EndpointPool::new(clients)?;
    info!(endpoint_count = cfg.rpc_urls.len(), "RPC endpoint pool initialized");

    // Attestation service client
    let oracle = Arc::new(HttpAttestationClient::new(
        cfg.attestation_api_url.clone(),
        cfg.attestation_quorum,
    ));

    // Position id source: static file wins over the on-chain registry
    let source = match (&cfg.positions_file, cfg.position_registry) {
        (Some(path), _) => PositionSource::Static(registry::load_positions_file(path)?),
        (None, Some(address)) => PositionSource::Registry(address),
        (None, None) => eyre::bail!("Set POSITION_REGISTRY_ADDRESS or POSITIONS_FILE"),
    };

    // Run the backfill across the configured range
    let driver = TimeWindowDriver::new(pool, oracle, store, source, DriverConfig::from(&cfg));
    let report = driver.run().await?;

    info!(
        steps_completed = report.steps_completed,
        snapshots_written = report.snapshots_written,
        write_failures = report.write_failures,
        skipped_positions = report.skipped_positions,
        endpoint_swaps = report.endpoint_swaps,
        "Snapshot backfill completed"
    );

    tokio::time::sleep(Duration::from_secs(3)).await; // Allow time for logging to flush
    Ok(())
}
