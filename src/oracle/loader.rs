use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::attestation::AttestationBundle;
use crate::errors::OracleError;

/// Source of timestamp-scoped attestation bundles.
///
/// Implementations must not retry internally; transient failures belong to
/// the driver's endpoint-failover loop.
#[async_trait]
pub trait AttestationClient: Send + Sync {
    async fn fetch_bundle(
        &self,
        timestamp_ms: u64,
        network: &str,
    ) -> Result<AttestationBundle, OracleError>;
}

#[derive(Serialize)]
struct BundleQuery<'a> {
    timestamp: u64,
    network: &'a str,
}

/// HTTP client for the archival attestation service.
pub struct HttpAttestationClient {
    client: Client,
    base_url: String,
    quorum: usize,
}

impl HttpAttestationClient {
    pub fn new(base_url: String, quorum: usize) -> Self {
        Self {
            client: Client::new(),
            base_url,
            quorum,
        }
    }
}

#[async_trait]
impl AttestationClient for HttpAttestationClient {
    async fn fetch_bundle(
        &self,
        timestamp_ms: u64,
        network: &str,
    ) -> Result<AttestationBundle, OracleError> {
        let params = serde_url_params::to_string(&BundleQuery {
            timestamp: timestamp_ms,
            network,
        })
        .map_err(|e| OracleError::Malformed(e.to_string()))?;
        let url = format!(
            "{}/v1/attestations?{}",
            self.base_url.trim_end_matches('/'),
            params
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?;
        let bundle: AttestationBundle = response.json().await?;
        debug!(
            timestamp_ms = timestamp_ms,
            network = %network,
            price_count = bundle.prices.len(),
            "Fetched attestation bundle"
        );

        bundle.verify_quorum(self.quorum)?;
        Ok(bundle)
    }
}
