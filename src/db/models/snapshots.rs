use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted position snapshot row, keyed by (id, timestamp).
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotModel {
    pub id: String,
    pub timestamp: i64,
    pub total_value: Decimal,
    pub borrowed: Decimal,
    pub collateral: Decimal,
    pub time_weighted_value: Decimal,
    pub health: Decimal,
    pub solvent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSnapshotModel {
    /// Lower-case hex position address.
    pub id: String,
    /// Milliseconds since epoch; the logical as-of instant.
    pub timestamp: i64,
    pub total_value: Decimal,
    pub borrowed: Decimal,
    pub collateral: Decimal,
    pub time_weighted_value: Decimal,
    pub health: Decimal,
    pub solvent: bool,
}
