#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, U256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use position_snapshot_pipeline::chain::rpc::ChainRpc;
use position_snapshot_pipeline::db::models::snapshots::NewSnapshotModel;
use position_snapshot_pipeline::db::store::SnapshotStore;
use position_snapshot_pipeline::driver::DriverConfig;
use position_snapshot_pipeline::errors::{OracleError, PersistenceError, RpcError};
use position_snapshot_pipeline::oracle::attestation::{AttestationBundle, SignedPrice};
use position_snapshot_pipeline::oracle::loader::AttestationClient;

pub fn position(n: u8) -> Address {
    Address::repeat_byte(n)
}

pub fn position_id(n: u8) -> String {
    format!("{:#x}", position(n))
}

/// Raw field order: total_value, borrowed, time_weighted_value, health, solvent_raw.
pub fn state(total: u64, borrowed: u64, solvent_raw: u64) -> [U256; 5] {
    [
        U256::from(total),
        U256::from(borrowed),
        U256::from(total / 2),
        U256::from(2u64),
        U256::from(solvent_raw),
    ]
}

/// In-memory chain: a strictly increasing (or hand-written) list of block
/// timestamps plus per-account raw states served by `call_at`.
pub struct MockChain {
    pub name: String,
    pub block_timestamps_ms: Vec<u64>,
    pub states: HashMap<Address, [U256; 5]>,
    pub failing_positions: Vec<Address>,
    pub fail_all: bool,
}

impl MockChain {
    pub fn new(name: &str, genesis_ms: u64, interval_ms: u64, block_count: u64) -> Self {
        Self::with_timestamps(
            name,
            (0..block_count).map(|i| genesis_ms + i * interval_ms).collect(),
        )
    }

    pub fn with_timestamps(name: &str, block_timestamps_ms: Vec<u64>) -> Self {
        Self {
            name: name.to_string(),
            block_timestamps_ms,
            states: HashMap::new(),
            failing_positions: Vec::new(),
            fail_all: false,
        }
    }

    pub fn with_state(mut self, account: Address, raw: [U256; 5]) -> Self {
        self.states.insert(account, raw);
        self
    }

    pub fn with_failing_position(mut self, account: Address) -> Self {
        self.failing_positions.push(account);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    fn outage(&self) -> RpcError {
        RpcError::Transport(format!("{}: injected outage", self.name))
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        if self.fail_all {
            return Err(self.outage());
        }
        Ok(self.block_timestamps_ms.len() as u64 - 1)
    }

    async fn block_timestamp_ms(&self, number: u64) -> Result<Option<u64>, RpcError> {
        if self.fail_all {
            return Err(self.outage());
        }
        Ok(self.block_timestamps_ms.get(number as usize).copied())
    }

    async fn call_at(&self, _to: Address, calldata: Bytes, _block: u64) -> Result<Bytes, RpcError> {
        if self.fail_all {
            return Err(self.outage());
        }

        // A bare selector is the registry listing; anything longer is an
        // account snapshot query with the account in the first argument word.
        if calldata.len() == 4 {
            let accounts: Vec<Token> = self.states.keys().map(|a| Token::Address(*a)).collect();
            return Ok(Bytes::from(abi::encode(&[Token::Array(accounts)])));
        }

        let account = Address::from_slice(&calldata[16..36]);
        if self.failing_positions.contains(&account) {
            return Err(RpcError::Transport("execution reverted".to_string()));
        }
        let raw = self
            .states
            .get(&account)
            .ok_or_else(|| RpcError::Transport(format!("unknown account {:?}", account)))?;
        let words: Vec<Token> = raw.iter().map(|v| Token::Uint(*v)).collect();
        Ok(Bytes::from(abi::encode(&words)))
    }
}

pub fn sample_bundle(timestamp_ms: u64, network: &str) -> AttestationBundle {
    let record = |signer: &str| SignedPrice {
        feed_id: "ETH".to_string(),
        price: "3000.5".to_string(),
        publish_time: timestamp_ms / 1000,
        signer: signer.to_string(),
        signature: "0xsig".to_string(),
        payload: "0x0102".to_string(),
    };
    AttestationBundle {
        network: network.to_string(),
        timestamp_ms,
        prices: vec![record("signer-a"), record("signer-b"), record("signer-c")],
    }
}

/// Attestation client that can fail a configured number of leading requests.
pub struct MockOracle {
    fail_first: AtomicU32,
    pub requests: AtomicU64,
}

impl MockOracle {
    pub fn healthy() -> Self {
        Self::fail_first(0)
    }

    pub fn fail_first(failures: u32) -> Self {
        Self {
            fail_first: AtomicU32::new(failures),
            requests: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl AttestationClient for MockOracle {
    async fn fetch_bundle(
        &self,
        timestamp_ms: u64,
        network: &str,
    ) -> Result<AttestationBundle, OracleError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_first.load(Ordering::SeqCst) > 0 {
            self.fail_first.fetch_sub(1, Ordering::SeqCst);
            return Err(OracleError::Quorum {
                feed: "ETH".to_string(),
                signers: 1,
                quorum: 3,
            });
        }
        Ok(sample_bundle(timestamp_ms, network))
    }
}

/// In-memory upsert store keyed like the real table.
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(String, i64), NewSnapshotModel>>,
    pub writes: AtomicU64,
    pub failing_ids: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            writes: AtomicU64::new(0),
            failing_ids: Vec::new(),
        }
    }

    pub fn failing_for(ids: Vec<String>) -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            writes: AtomicU64::new(0),
            failing_ids: ids,
        }
    }

    pub fn rows(&self) -> Vec<NewSnapshotModel> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, id: &str, timestamp: i64) -> Option<NewSnapshotModel> {
        self.rows
            .lock()
            .unwrap()
            .get(&(id.to_string(), timestamp))
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn upsert(&self, snapshot: &NewSnapshotModel) -> Result<(), PersistenceError> {
        if self.failing_ids.contains(&snapshot.id) {
            return Err(PersistenceError::Unavailable("injected store outage".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows
            .lock()
            .unwrap()
            .insert((snapshot.id.clone(), snapshot.timestamp), snapshot.clone());
        Ok(())
    }
}

pub fn driver_config(start_ms: u64, end_ms: u64, step_ms: u64) -> DriverConfig {
    DriverConfig {
        network: "testnet".to_string(),
        reader: Address::repeat_byte(0xee),
        start_timestamp_ms: start_ms,
        end_timestamp_ms: end_ms,
        step_ms,
        batch_size: 2,
        value_decimals: 0,
        max_failover_rounds: 2,
    }
}
