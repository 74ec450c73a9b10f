use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::keccak256;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::chain::rpc::ChainRpc;
use crate::errors::CallError;

const ACCOUNT_SNAPSHOT_SIG: &[u8] = b"getAccountSnapshot(address,bytes[])";

/// Raw return of one historical position query, before metric derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPositionState {
    pub total_value: U256,
    pub borrowed: U256,
    pub time_weighted_value: U256,
    pub health: U256,
    pub solvent_raw: U256,
}

/// Query every position as it existed at `block`, with the attestation
/// payload bound into each call.
///
/// Positions are processed in fixed-size batches: batches run strictly
/// sequentially, calls within a batch run concurrently. A failed call is
/// logged and its position omitted from the result; it never aborts the
/// batch, and it never produces a zeroed record.
pub async fn execute(
    rpc: &dyn ChainRpc,
    reader: Address,
    positions: &[Address],
    block: u64,
    price_payload: &[Bytes],
    batch_size: usize,
) -> Vec<(Address, RawPositionState)> {
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(positions.len());

    for (batch_index, batch) in positions.chunks(batch_size).enumerate() {
        let calls = batch.iter().map(|&position| async move {
            let calldata = encode_snapshot_call(position, price_payload);
            let raw = rpc
                .call_at(reader, calldata, block)
                .await
                .map_err(|source| CallError::Rpc {
                    target: position,
                    source,
                })?;
            decode_snapshot_return(position, &raw).map(|state| (position, state))
        });

        let mut failed = 0usize;
        for outcome in join_all(calls).await {
            match outcome {
                Ok(pair) => results.push(pair),
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, block = block, "Historical call failed, omitting position");
                }
            }
        }

        debug!(
            batch_index = batch_index,
            batch_len = batch.len(),
            failed = failed,
            block = block,
            "Batch completed"
        );
    }

    results
}

fn encode_snapshot_call(position: Address, price_payload: &[Bytes]) -> Bytes {
    let selector = &keccak256(ACCOUNT_SNAPSHOT_SIG)[..4];
    let args = abi::encode(&[
        Token::Address(position),
        Token::Array(
            price_payload
                .iter()
                .map(|b| Token::Bytes(b.to_vec()))
                .collect(),
        ),
    ]);
    let mut calldata = selector.to_vec();
    calldata.extend_from_slice(&args);
    Bytes::from(calldata)
}

fn decode_snapshot_return(position: Address, raw: &[u8]) -> Result<RawPositionState, CallError> {
    let tokens = abi::decode(
        &[
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(256),
        ],
        raw,
    )
    .map_err(|e| CallError::Decode {
        target: position,
        reason: e.to_string(),
    })?;

    let mut words = tokens.into_iter().map(|t| t.into_uint());
    let mut next = || {
        words.next().flatten().ok_or(CallError::Decode {
            target: position,
            reason: "expected five uint256 words".to_string(),
        })
    };

    Ok(RawPositionState {
        total_value: next()?,
        borrowed: next()?,
        time_weighted_value: next()?,
        health: next()?,
        solvent_raw: next()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_call_is_selector_plus_args() {
        let position = Address::repeat_byte(0x11);
        let payload = vec![Bytes::from(vec![0xaa, 0xbb])];
        let calldata = encode_snapshot_call(position, &payload);

        assert_eq!(&calldata[..4], &keccak256(ACCOUNT_SNAPSHOT_SIG)[..4]);
        let tokens = abi::decode(
            &[
                ParamType::Address,
                ParamType::Array(Box::new(ParamType::Bytes)),
            ],
            &calldata[4..],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::Address(position));
        assert_eq!(tokens[1], Token::Array(vec![Token::Bytes(vec![0xaa, 0xbb])]));
    }

    #[test]
    fn return_value_decodes_in_field_order() {
        let position = Address::repeat_byte(0x22);
        let raw = abi::encode(&[
            Token::Uint(U256::from(500u64)),
            Token::Uint(U256::from(120u64)),
            Token::Uint(U256::from(480u64)),
            Token::Uint(U256::from(2u64)),
            Token::Uint(U256::one()),
        ]);
        let state = decode_snapshot_return(position, &raw).unwrap();
        assert_eq!(state.total_value, U256::from(500u64));
        assert_eq!(state.borrowed, U256::from(120u64));
        assert_eq!(state.time_weighted_value, U256::from(480u64));
        assert_eq!(state.health, U256::from(2u64));
        assert_eq!(state.solvent_raw, U256::one());
    }

    #[test]
    fn truncated_return_is_a_decode_error() {
        let position = Address::repeat_byte(0x33);
        let raw = abi::encode(&[Token::Uint(U256::one())]);
        assert!(matches!(
            decode_snapshot_return(position, &raw),
            Err(CallError::Decode { .. })
        ));
    }
}
