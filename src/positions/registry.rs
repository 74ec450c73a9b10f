use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes};
use ethers::utils::keccak256;
use eyre::{Result, eyre};
use std::fs;
use std::str::FromStr;
use tracing::info;

use crate::chain::rpc::ChainRpc;
use crate::errors::CallError;

const LIST_ACCOUNTS_SIG: &[u8] = b"getAllAccounts()";

/// Fetch every known position id from the on-chain registry, as of `block`.
/// Called once per run; the driver caches the result.
pub async fn list_positions(
    rpc: &dyn ChainRpc,
    registry: Address,
    block: u64,
) -> Result<Vec<Address>, CallError> {
    let selector = &keccak256(LIST_ACCOUNTS_SIG)[..4];
    let calldata = Bytes::from(selector.to_vec());

    let raw = rpc
        .call_at(registry, calldata, block)
        .await
        .map_err(|source| CallError::Rpc {
            target: registry,
            source,
        })?;

    let mut tokens = abi::decode(&[ParamType::Array(Box::new(ParamType::Address))], &raw)
        .map_err(|e| CallError::Decode {
            target: registry,
            reason: e.to_string(),
        })?;

    let Some(Token::Array(items)) = tokens.pop() else {
        return Err(CallError::Decode {
            target: registry,
            reason: "expected address[]".to_string(),
        });
    };

    let mut positions = Vec::with_capacity(items.len());
    for item in items {
        let address = item.into_address().ok_or_else(|| CallError::Decode {
            target: registry,
            reason: "array element is not an address".to_string(),
        })?;
        positions.push(address);
    }

    info!(
        registry = %registry,
        block = block,
        position_count = positions.len(),
        "Listed positions from registry"
    );
    Ok(positions)
}

/// Load a static position list from a JSON file of the shape
/// `{ "positions": ["0x...", ...] }`.
pub fn load_positions_file(path: &str) -> Result<Vec<Address>> {
    info!(file = %path, "Loading positions from file");
    let file_content = fs::read_to_string(path)?;
    let json_data: serde_json::Value = serde_json::from_str(&file_content)?;
    let entries = json_data
        .get("positions")
        .and_then(|v| v.as_array())
        .ok_or_else(|| eyre!("Positions not found in JSON data"))?;

    let mut positions = Vec::with_capacity(entries.len());
    for entry in entries {
        let raw = entry
            .as_str()
            .ok_or_else(|| eyre!("Position entry is not a string"))?;
        positions.push(Address::from_str(raw)?);
    }
    info!(loaded_count = positions.len(), "Positions loaded from file");
    Ok(positions)
}
