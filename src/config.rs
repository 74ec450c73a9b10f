use dotenvy::dotenv;
use ethers::types::Address;
use std::env;

/// Three days, the step the incentive accounting is defined over.
const DEFAULT_STEP_INTERVAL_MS: u64 = 3 * 24 * 60 * 60 * 1000;

pub struct Config {
    pub network: String,
    pub rpc_urls: Vec<String>,
    pub database_url: String,
    pub attestation_api_url: String,
    pub attestation_quorum: usize,
    pub position_reader: Address,
    pub position_registry: Option<Address>,
    pub positions_file: Option<String>,
    pub snapshot_table: String,
    pub snapshot_batch_size: usize,
    pub step_interval_ms: u64,
    pub start_timestamp_ms: u64,
    pub end_timestamp_ms: u64,
    pub value_decimals: u8,
    pub rpc_call_timeout_ms: u64,
    pub max_failover_rounds: u32,
}

impl Config {
    pub fn load() -> Self {
        dotenv().ok();

        let network = env::var("NETWORK").expect("Missing NETWORK");

        let rpc_urls: Vec<String> = env::var("RPC_URLS")
            .expect("Missing RPC_URLS")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if rpc_urls.len() < 2 {
            panic!("RPC_URLS must list at least two endpoints for failover");
        }

        let database_url = env::var("DATABASE_URL").expect("Missing DATABASE_URL");
        let attestation_api_url =
            env::var("ATTESTATION_API_URL").expect("Missing ATTESTATION_API_URL");

        let position_reader: Address = env::var("POSITION_READER_ADDRESS")
            .expect("Missing POSITION_READER_ADDRESS")
            .parse()
            .expect("Invalid POSITION_READER_ADDRESS");

        let position_registry: Option<Address> = env::var("POSITION_REGISTRY_ADDRESS")
            .ok()
            .map(|s| s.parse().expect("Invalid POSITION_REGISTRY_ADDRESS"));
        let positions_file = env::var("POSITIONS_FILE").ok();
        if position_registry.is_none() && positions_file.is_none() {
            panic!("Set POSITION_REGISTRY_ADDRESS or POSITIONS_FILE");
        }

        let start_timestamp_ms: u64 = env::var("START_TIMESTAMP_MS")
            .expect("Missing START_TIMESTAMP_MS")
            .parse()
            .expect("Invalid START_TIMESTAMP_MS");
        let end_timestamp_ms: u64 = env::var("END_TIMESTAMP_MS")
            .expect("Missing END_TIMESTAMP_MS")
            .parse()
            .expect("Invalid END_TIMESTAMP_MS");
        if end_timestamp_ms < start_timestamp_ms {
            panic!("END_TIMESTAMP_MS must not precede START_TIMESTAMP_MS");
        }

        Config {
            network,
            rpc_urls,
            database_url,
            attestation_api_url,
            attestation_quorum: env_or("ATTESTATION_QUORUM", 3),
            position_reader,
            position_registry,
            positions_file,
            snapshot_table: env::var("SNAPSHOT_TABLE")
                .unwrap_or_else(|_| "position_snapshots".to_string()),
            snapshot_batch_size: env_or("SNAPSHOT_BATCH_SIZE", 150),
            step_interval_ms: env_or("STEP_INTERVAL_MS", DEFAULT_STEP_INTERVAL_MS),
            start_timestamp_ms,
            end_timestamp_ms,
            value_decimals: env_or("VALUE_DECIMALS", 18),
            rpc_call_timeout_ms: env_or("RPC_CALL_TIMEOUT_MS", 10_000),
            max_failover_rounds: env_or("MAX_FAILOVER_ROUNDS", 5),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("Invalid {} value", key)),
        Err(_) => default,
    }
}
