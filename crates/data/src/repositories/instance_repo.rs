//! Strategy instance repository.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::StrategyInstanceRecord;

/// Repository for strategy instance rows.
#[derive(Debug, Clone)]
pub struct StrategyInstanceRepository {
    pool: PgPool,
}

impl StrategyInstanceRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets one instance by id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: i64) -> Result<Option<StrategyInstanceRecord>> {
        let record = sqlx::query_as::<_, StrategyInstanceRecord>(
            r"
            SELECT id, client, portfolio, broker_account, strategy_slug,
                   strategy_version, risk_mode, config, enabled
            FROM strategy_instances
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Lists every enabled instance, in id order for deterministic sweeps.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_enabled(&self) -> Result<Vec<StrategyInstanceRecord>> {
        let records = sqlx::query_as::<_, StrategyInstanceRecord>(
            r"
            SELECT id, client, portfolio, broker_account, strategy_slug,
                   strategy_version, risk_mode, config, enabled
            FROM strategy_instances
            WHERE enabled = TRUE
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
