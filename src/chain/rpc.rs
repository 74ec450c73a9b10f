use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, BlockNumber, Bytes, TransactionRequest, U64};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::errors::{PipelineError, RpcError};

/// The read-only capability surface the pipeline needs from a chain endpoint.
///
/// Block timestamps are surfaced in milliseconds to match the cursor domain.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Endpoint label for logs.
    fn endpoint(&self) -> &str;

    async fn latest_block_number(&self) -> Result<u64, RpcError>;

    /// `None` when the block does not exist on this endpoint.
    async fn block_timestamp_ms(&self, number: u64) -> Result<Option<u64>, RpcError>;

    /// `eth_call` against `to` pinned to a historical block.
    async fn call_at(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, RpcError>;
}

/// Production endpoint backed by an ethers HTTP provider. Every request is
/// bounded by `call_timeout`; a timeout is transport failure like any other.
pub struct EthersRpc {
    provider: Arc<Provider<Http>>,
    url: String,
    call_timeout: Duration,
}

impl EthersRpc {
    pub fn connect(url: &str, call_timeout: Duration) -> eyre::Result<Self> {
        Url::parse(url)?;
        let provider = Provider::<Http>::try_from(url)?;
        Ok(Self {
            provider: Arc::new(provider),
            url: url.to_string(),
            call_timeout,
        })
    }

    fn timeout_ms(&self) -> u64 {
        self.call_timeout.as_millis() as u64
    }
}

#[async_trait]
impl ChainRpc for EthersRpc {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        let number = timeout(self.call_timeout, self.provider.get_block_number())
            .await
            .map_err(|_| RpcError::Timeout(self.timeout_ms()))?
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(number.as_u64())
    }

    async fn block_timestamp_ms(&self, number: u64) -> Result<Option<u64>, RpcError> {
        let block = timeout(self.call_timeout, self.provider.get_block(number))
            .await
            .map_err(|_| RpcError::Timeout(self.timeout_ms()))?
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        // Chain headers carry seconds
        Ok(block.map(|b| b.timestamp.as_u64() * 1000))
    }

    async fn call_at(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, RpcError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(calldata).into();
        let block_id = BlockId::Number(BlockNumber::Number(U64::from(block)));
        let raw = timeout(self.call_timeout, self.provider.call(&tx, Some(block_id)))
            .await
            .map_err(|_| RpcError::Timeout(self.timeout_ms()))?
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(raw)
    }
}

/// Fixed pool of independently configured endpoints for one network.
/// Rotation is round-robin; only the time-window driver may rotate.
pub struct EndpointPool {
    clients: Vec<Arc<dyn ChainRpc>>,
    active: usize,
}

impl EndpointPool {
    pub fn new(clients: Vec<Arc<dyn ChainRpc>>) -> Result<Self, PipelineError> {
        if clients.is_empty() {
            return Err(PipelineError::NoEndpoints);
        }
        Ok(Self { clients, active: 0 })
    }

    pub fn active(&self) -> Arc<dyn ChainRpc> {
        Arc::clone(&self.clients[self.active])
    }

    /// Advance to the next endpoint and return its label.
    pub fn rotate(&mut self) -> &str {
        self.active = (self.active + 1) % self.clients.len();
        self.clients[self.active].endpoint()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
