use tracing::debug;

use super::rpc::ChainRpc;
use crate::errors::ResolutionError;

/// Resolve a wall-clock timestamp to the smallest block whose on-chain
/// timestamp is at or after it.
///
/// Binary search over `[0, head]` on block timestamps. When several blocks
/// share a timestamp the smallest qualifying number wins, so resolution is
/// deterministic and monotone in the target.
pub async fn resolve(rpc: &dyn ChainRpc, timestamp_ms: u64) -> Result<u64, ResolutionError> {
    let head = rpc.latest_block_number().await?;
    let head_timestamp_ms = block_timestamp(rpc, head).await?;
    if timestamp_ms > head_timestamp_ms {
        return Err(ResolutionError::AfterHead {
            timestamp_ms,
            head,
            head_timestamp_ms,
        });
    }

    let genesis_timestamp_ms = block_timestamp(rpc, 0).await?;
    if timestamp_ms < genesis_timestamp_ms {
        return Err(ResolutionError::BeforeGenesis {
            timestamp_ms,
            genesis_timestamp_ms,
        });
    }

    let mut lo = 0u64;
    let mut hi = head;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mid_timestamp_ms = block_timestamp(rpc, mid).await?;
        if mid_timestamp_ms >= timestamp_ms {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    debug!(
        timestamp_ms = timestamp_ms,
        block = lo,
        "Resolved timestamp to block"
    );
    Ok(lo)
}

async fn block_timestamp(rpc: &dyn ChainRpc, number: u64) -> Result<u64, ResolutionError> {
    rpc.block_timestamp_ms(number)
        .await?
        .ok_or(ResolutionError::MissingBlock(number))
}
