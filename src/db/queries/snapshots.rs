use sqlx::PgPool;

use crate::db::models::snapshots::{NewSnapshotModel, SnapshotModel};

/// Upsert a snapshot by its natural key. Re-running a timestamp overwrites
/// the existing row rather than duplicating it.
pub async fn upsert_snapshot(
    pool: &PgPool,
    table: &str,
    snapshot: &NewSnapshotModel,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO {table} (
            id, timestamp, total_value, borrowed, collateral, time_weighted_value, health, solvent
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id, timestamp) DO UPDATE SET
            total_value = EXCLUDED.total_value,
            borrowed = EXCLUDED.borrowed,
            collateral = EXCLUDED.collateral,
            time_weighted_value = EXCLUDED.time_weighted_value,
            health = EXCLUDED.health,
            solvent = EXCLUDED.solvent
        "#
    );
    sqlx::query(&sql)
        .bind(&snapshot.id)
        .bind(snapshot.timestamp)
        .bind(snapshot.total_value)
        .bind(snapshot.borrowed)
        .bind(snapshot.collateral)
        .bind(snapshot.time_weighted_value)
        .bind(snapshot.health)
        .bind(snapshot.solvent)
        .execute(pool)
        .await?;

    Ok(())
}

/// Fetch one snapshot by its natural key.
pub async fn get_snapshot(
    pool: &PgPool,
    table: &str,
    id: &str,
    timestamp: i64,
) -> Result<Option<SnapshotModel>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT id, timestamp, total_value, borrowed, collateral, time_weighted_value, health, solvent
        FROM {table}
        WHERE id = $1 AND timestamp = $2
        "#
    );
    sqlx::query_as::<_, SnapshotModel>(&sql)
        .bind(id)
        .bind(timestamp)
        .fetch_optional(pool)
        .await
}

/// Fetch the full series for one position, oldest first.
pub async fn get_snapshots_for_position(
    pool: &PgPool,
    table: &str,
    id: &str,
) -> Result<Vec<SnapshotModel>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT id, timestamp, total_value, borrowed, collateral, time_weighted_value, health, solvent
        FROM {table}
        WHERE id = $1
        ORDER BY timestamp ASC
        "#
    );
    sqlx::query_as::<_, SnapshotModel>(&sql)
        .bind(id)
        .fetch_all(pool)
        .await
}

/// Fetch the most recent snapshot for one position.
pub async fn get_latest_snapshot(
    pool: &PgPool,
    table: &str,
    id: &str,
) -> Result<Option<SnapshotModel>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT id, timestamp, total_value, borrowed, collateral, time_weighted_value, health, solvent
        FROM {table}
        WHERE id = $1
        ORDER BY timestamp DESC
        LIMIT 1
        "#
    );
    sqlx::query_as::<_, SnapshotModel>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}
