use ethers::types::{Address, Bytes};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::chain::block_resolver;
use crate::chain::rpc::{ChainRpc, EndpointPool};
use crate::config::Config;
use crate::db::models::snapshots::NewSnapshotModel;
use crate::db::store::SnapshotStore;
use crate::errors::{CallError, OracleError, PipelineError, ResolutionError};
use crate::oracle::loader::AttestationClient;
use crate::positions::{executor, metrics, registry};

/// Where the set of position ids comes from: a fixed list, or one on-chain
/// registry read at the first resolved block of the run.
pub enum PositionSource {
    Static(Vec<Address>),
    Registry(Address),
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub network: String,
    pub reader: Address,
    pub start_timestamp_ms: u64,
    pub end_timestamp_ms: u64,
    pub step_ms: u64,
    pub batch_size: usize,
    pub value_decimals: u8,
    pub max_failover_rounds: u32,
}

impl From<&Config> for DriverConfig {
    fn from(config: &Config) -> Self {
        Self {
            network: config.network.clone(),
            reader: config.position_reader,
            start_timestamp_ms: config.start_timestamp_ms,
            end_timestamp_ms: config.end_timestamp_ms,
            step_ms: config.step_interval_ms,
            batch_size: config.snapshot_batch_size,
            value_decimals: config.value_decimals,
            max_failover_rounds: config.max_failover_rounds,
        }
    }
}

/// Summary of one completed run, for the binary's closing log line.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub steps_completed: u64,
    pub snapshots_written: u64,
    pub write_failures: u64,
    pub skipped_positions: u64,
    pub endpoint_swaps: u64,
}

/// A step-stopping failure: the whole timestamp is retried on the next
/// endpoint. Per-position and per-record failures never surface here.
#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Positions(#[from] CallError),
}

enum DriverState {
    Resolving,
    Executing { block: u64, payload: Vec<Bytes> },
    Persisting { snapshots: Vec<NewSnapshotModel> },
    Advancing,
    Failing { cause: StepError },
    Done,
}

/// Owns the cursor and the active RPC endpoint; nothing else may touch
/// either. Walks the configured time range one step at a time, swapping the
/// endpoint and retrying the same cursor on step failure.
pub struct TimeWindowDriver {
    pool: EndpointPool,
    oracle: Arc<dyn AttestationClient>,
    store: Arc<dyn SnapshotStore>,
    source: PositionSource,
    cfg: DriverConfig,
    cursor: u64,
    positions: Option<Vec<Address>>,
}

impl TimeWindowDriver {
    pub fn new(
        pool: EndpointPool,
        oracle: Arc<dyn AttestationClient>,
        store: Arc<dyn SnapshotStore>,
        source: PositionSource,
        cfg: DriverConfig,
    ) -> Self {
        let cursor = cfg.start_timestamp_ms;
        Self {
            pool,
            oracle,
            store,
            source,
            cfg,
            cursor,
            positions: None,
        }
    }

    pub async fn run(mut self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        let mut consecutive_failures: u32 = 0;
        let mut state = if self.cursor > self.cfg.end_timestamp_ms {
            DriverState::Done
        } else {
            DriverState::Resolving
        };

        loop {
            state = match state {
                DriverState::Resolving => {
                    let rpc = self.pool.active();
                    let (block_result, bundle_result) = tokio::join!(
                        block_resolver::resolve(rpc.as_ref(), self.cursor),
                        self.oracle.fetch_bundle(self.cursor, &self.cfg.network),
                    );

                    match (block_result, bundle_result) {
                        (Ok(block), Ok(bundle)) => {
                            info!(
                                cursor_ms = self.cursor,
                                block = block,
                                price_count = bundle.prices.len(),
                                "Resolved timestamp and loaded attestation bundle"
                            );
                            match bundle.calldata_payload() {
                                Ok(payload) => match self.ensure_positions(rpc.as_ref(), block).await {
                                    Ok(()) => DriverState::Executing { block, payload },
                                    Err(e) => DriverState::Failing { cause: e.into() },
                                },
                                Err(e) => DriverState::Failing { cause: e.into() },
                            }
                        }
                        (Err(e), _) => DriverState::Failing { cause: e.into() },
                        (_, Err(e)) => DriverState::Failing { cause: e.into() },
                    }
                }

                DriverState::Executing { block, payload } => {
                    let rpc = self.pool.active();
                    let positions = self.positions.clone().unwrap_or_default();
                    let raw_states = executor::execute(
                        rpc.as_ref(),
                        self.cfg.reader,
                        &positions,
                        block,
                        &payload,
                        self.cfg.batch_size,
                    )
                    .await;
                    report.skipped_positions += (positions.len() - raw_states.len()) as u64;

                    let mut snapshots = Vec::with_capacity(raw_states.len());
                    for (position, raw) in &raw_states {
                        match metrics::derive_snapshot(
                            *position,
                            self.cursor,
                            raw,
                            self.cfg.value_decimals,
                        ) {
                            Ok(snapshot) => snapshots.push(snapshot),
                            Err(e) => {
                                report.skipped_positions += 1;
                                warn!(error = %e, "Could not derive snapshot, omitting position");
                            }
                        }
                    }
                    DriverState::Persisting { snapshots }
                }

                DriverState::Persisting { snapshots } => {
                    for snapshot in &snapshots {
                        match self.store.upsert(snapshot).await {
                            Ok(()) => report.snapshots_written += 1,
                            Err(e) => {
                                report.write_failures += 1;
                                warn!(
                                    error = %e,
                                    id = %snapshot.id,
                                    timestamp = snapshot.timestamp,
                                    "Snapshot write failed, continuing"
                                );
                            }
                        }
                    }
                    consecutive_failures = 0;
                    DriverState::Advancing
                }

                DriverState::Advancing => {
                    report.steps_completed += 1;
                    info!(
                        cursor_ms = self.cursor,
                        steps_completed = report.steps_completed,
                        "Timestamp step completed"
                    );
                    match self.cursor.checked_add(self.cfg.step_ms) {
                        Some(next) if next <= self.cfg.end_timestamp_ms => {
                            self.cursor = next;
                            DriverState::Resolving
                        }
                        _ => DriverState::Done,
                    }
                }

                DriverState::Failing { cause } => {
                    consecutive_failures += 1;
                    let max_attempts =
                        self.pool.len() as u32 * self.cfg.max_failover_rounds.max(1);
                    if consecutive_failures >= max_attempts {
                        return Err(PipelineError::EndpointsExhausted {
                            endpoints: self.pool.len(),
                            attempts: consecutive_failures,
                            cursor_ms: self.cursor,
                            last_error: cause.to_string(),
                        });
                    }
                    report.endpoint_swaps += 1;
                    let endpoint = self.pool.rotate();
                    warn!(
                        error = %cause,
                        cursor_ms = self.cursor,
                        endpoint = %endpoint,
                        attempt = consecutive_failures,
                        "Step failed, swapping rpc endpoint and retrying the same cursor"
                    );
                    DriverState::Resolving
                }

                DriverState::Done => return Ok(report),
            };
        }
    }

    /// Position ids are listed once per run, at the first resolved block.
    async fn ensure_positions(
        &mut self,
        rpc: &dyn ChainRpc,
        block: u64,
    ) -> Result<(), CallError> {
        if self.positions.is_some() {
            return Ok(());
        }
        let positions = match &self.source {
            PositionSource::Static(list) => list.clone(),
            PositionSource::Registry(address) => {
                registry::list_positions(rpc, *address, block).await?
            }
        };
        info!(position_count = positions.len(), "Position set fixed for this run");
        self.positions = Some(positions);
        Ok(())
    }
}
