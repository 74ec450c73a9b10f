use async_trait::async_trait;
use sqlx::PgPool;

use super::models::snapshots::NewSnapshotModel;
use super::queries::snapshots as snapshot_queries;
use crate::errors::PersistenceError;

/// Idempotent snapshot sink, keyed by (id, timestamp).
///
/// Concurrent writers across pipeline runs are safe because every write is an
/// upsert on the natural key.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn upsert(&self, snapshot: &NewSnapshotModel) -> Result<(), PersistenceError>;
}

pub struct PgSnapshotStore {
    pool: PgPool,
    table: String,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool, table: String) -> Self {
        Self { pool, table }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn upsert(&self, snapshot: &NewSnapshotModel) -> Result<(), PersistenceError> {
        snapshot_queries::upsert_snapshot(&self.pool, &self.table, snapshot).await?;
        Ok(())
    }
}
