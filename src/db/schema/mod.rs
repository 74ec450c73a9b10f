use sqlx::{Executor, postgres::PgPool};

/// Create the snapshot table and its indices if they do not exist yet.
/// Safe to run on every start.
pub async fn init_schema(pool: &PgPool, table: &str) -> Result<(), sqlx::Error> {
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT NOT NULL,
            timestamp BIGINT NOT NULL,
            total_value NUMERIC NOT NULL,
            borrowed NUMERIC NOT NULL,
            collateral NUMERIC NOT NULL,
            time_weighted_value NUMERIC NOT NULL,
            health NUMERIC NOT NULL,
            solvent BOOLEAN NOT NULL,
            PRIMARY KEY (id, timestamp)
        );
        "#
    );
    pool.execute(ddl.as_str()).await?;

    // Index on timestamp for the range scans the payout jobs run
    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{table}_timestamp
        ON {table}(timestamp);
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}
