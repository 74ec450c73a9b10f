use ethers::types::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::OracleError;

/// One signed price record as served by the archival attestation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedPrice {
    pub feed_id: String,
    /// Decimal string, exactly as signed; never reinterpreted here.
    pub price: String,
    pub publish_time: u64,
    pub signer: String,
    pub signature: String,
    /// Hex-encoded attestation blob, bound verbatim into call payloads.
    pub payload: String,
}

/// The set of signed price records valid at one timestamp on one network.
/// Immutable once fetched; held only while its timestamp is being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationBundle {
    pub network: String,
    pub timestamp_ms: u64,
    pub prices: Vec<SignedPrice>,
}

impl AttestationBundle {
    /// Every feed must have at least `quorum` distinct signers agreeing on a
    /// single price. A signer attesting a different price does not count.
    pub fn verify_quorum(&self, quorum: usize) -> Result<(), OracleError> {
        let mut feeds: HashMap<&str, HashMap<&str, HashSet<&str>>> = HashMap::new();
        for record in &self.prices {
            feeds
                .entry(record.feed_id.as_str())
                .or_default()
                .entry(record.price.as_str())
                .or_default()
                .insert(record.signer.as_str());
        }

        if feeds.is_empty() {
            return Err(OracleError::Malformed("bundle contains no prices".to_string()));
        }

        for (feed, by_price) in feeds {
            let agreeing = by_price.values().map(HashSet::len).max().unwrap_or(0);
            if agreeing < quorum {
                return Err(OracleError::Quorum {
                    feed: feed.to_string(),
                    signers: agreeing,
                    quorum,
                });
            }
        }
        Ok(())
    }

    /// Decode the per-record payloads into the `bytes[]` argument the reader
    /// contract consumes alongside each historical query.
    pub fn calldata_payload(&self) -> Result<Vec<Bytes>, OracleError> {
        self.prices
            .iter()
            .map(|record| {
                let stripped = record.payload.trim_start_matches("0x");
                hex::decode(stripped)
                    .map(Bytes::from)
                    .map_err(|e| {
                        OracleError::Malformed(format!(
                            "payload for feed {} is not hex: {}",
                            record.feed_id, e
                        ))
                    })
            })
            .collect()
    }
}
