use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use super::executor::RawPositionState;
use crate::db::models::snapshots::NewSnapshotModel;
use crate::errors::CallError;

/// Derive the persisted snapshot record from one raw query result.
///
/// Pure; no I/O. Collateral is always recomputed locally from value and debt,
/// never taken from the remote side.
///
/// The reader encodes solvency as a uint word; a position counts as solvent
/// exactly when that word equals 1.
/// TODO: confirm with the contracts team whether the reader means a 0/1 flag
/// here or a 1e18-scaled value; the payout job has always compared against 1.
pub fn derive_snapshot(
    position: Address,
    timestamp_ms: u64,
    raw: &RawPositionState,
    value_decimals: u8,
) -> Result<NewSnapshotModel, CallError> {
    let total_value = u256_to_decimal(position, raw.total_value, value_decimals)?;
    let borrowed = u256_to_decimal(position, raw.borrowed, value_decimals)?;
    let time_weighted_value = u256_to_decimal(position, raw.time_weighted_value, value_decimals)?;
    let health = u256_to_decimal(position, raw.health, value_decimals)?;

    Ok(NewSnapshotModel {
        id: format!("{:#x}", position),
        timestamp: timestamp_ms as i64,
        total_value,
        borrowed,
        collateral: total_value - borrowed,
        time_weighted_value,
        health,
        solvent: raw.solvent_raw == U256::one(),
    })
}

fn u256_to_decimal(position: Address, val: U256, decimals: u8) -> Result<Decimal, CallError> {
    let formatted =
        ethers::utils::format_units(val, decimals as usize).map_err(|e| CallError::Value {
            target: position,
            reason: e.to_string(),
        })?;
    Decimal::from_str(&formatted).map_err(|e| CallError::Value {
        target: position,
        reason: e.to_string(),
    })
}
