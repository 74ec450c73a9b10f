use ethers::types::Address;
use thiserror::Error;

/// Transport-level failure of a single RPC request.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("rpc call timed out after {0}ms")]
    Timeout(u64),
}

/// Timestamp-to-block resolution failures.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("timestamp {timestamp_ms}ms is past the chain head (block {head} at {head_timestamp_ms}ms)")]
    AfterHead {
        timestamp_ms: u64,
        head: u64,
        head_timestamp_ms: u64,
    },
    #[error("timestamp {timestamp_ms}ms predates genesis ({genesis_timestamp_ms}ms)")]
    BeforeGenesis {
        timestamp_ms: u64,
        genesis_timestamp_ms: u64,
    },
    #[error("block {0} has no header")]
    MissingBlock(u64),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Attestation bundle retrieval and validation failures.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("attestation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("attestation response malformed: {0}")]
    Malformed(String),
    #[error("feed {feed} has {signers} agreeing signer(s), quorum is {quorum}")]
    Quorum {
        feed: String,
        signers: usize,
        quorum: usize,
    },
}

/// Failure of a single historical contract call, scoped to its target.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("historical call against {target:?} failed: {source}")]
    Rpc {
        target: Address,
        #[source]
        source: RpcError,
    },
    #[error("could not decode return data from {target:?}: {reason}")]
    Decode { target: Address, reason: String },
    #[error("value from {target:?} out of range: {reason}")]
    Value { target: Address, reason: String },
}

/// Snapshot store write failures. Isolated per record, never fatal.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot write failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Fatal pipeline outcomes. Everything else is retried or skipped.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no rpc endpoints configured")]
    NoEndpoints,
    #[error(
        "all {endpoints} rpc endpoint(s) failed {attempts} consecutive attempt(s) at cursor {cursor_ms}ms, last error: {last_error}"
    )]
    EndpointsExhausted {
        endpoints: usize,
        attempts: u32,
        cursor_ms: u64,
        last_error: String,
    },
}
