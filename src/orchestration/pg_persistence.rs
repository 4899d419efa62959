//! # PostgreSQL State Persistence
//!
//! Stores snapshots in `orchestration_states` (see `migrations/`). A save is a
//! single `INSERT ... ON CONFLICT DO UPDATE` statement, so concurrent saves for
//! one document serialize on the row and the last writer wins. The `status`
//! column duplicates the snapshot's status for operational queries.

use super::persistence::{ensure_key_matches, PersistenceError, PersistenceResult, StatePersistence};
use crate::config::PersistenceConfig;
use crate::models::OrchestrationState;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;

/// Snapshot persistence backed by a PostgreSQL table
#[derive(Debug, Clone)]
pub struct PgStatePersistence {
    pool: PgPool,
}

impl PgStatePersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the persistence section of the configuration
    pub async fn connect(config: &PersistenceConfig) -> PersistenceResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| {
                PersistenceError::Connection(
                    "persistence.database_url is not configured".to_string(),
                )
            })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl StatePersistence for PgStatePersistence {
    async fn save(&self, document_id: &str, state: &OrchestrationState) -> PersistenceResult<()> {
        ensure_key_matches(document_id, state)?;

        sqlx::query(
            r#"
            INSERT INTO orchestration_states
            (document_id, status, snapshot, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (document_id) DO UPDATE
            SET status = EXCLUDED.status,
                snapshot = EXCLUDED.snapshot,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(document_id)
        .bind(state.status.to_string())
        .bind(Json(state))
        .bind(state.created_at)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::SaveFailed {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })?;

        debug!(document_id = %document_id, status = %state.status, "💾 Snapshot saved");
        Ok(())
    }

    async fn load(&self, document_id: &str) -> PersistenceResult<Option<OrchestrationState>> {
        let row: Option<(Json<OrchestrationState>,)> = sqlx::query_as(
            r#"
            SELECT snapshot
            FROM orchestration_states
            WHERE document_id = $1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::LoadFailed {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })?;

        Ok(row.map(|(Json(state),)| state))
    }
}
