//! Run ledger repository.
//!
//! The unique index on `(strategy_instance_id, asof_ts)` is the concurrency
//! fence: of any number of identical triggers, exactly one insert returns a
//! row id and proceeds; the rest observe the conflict and stand down.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{RunStatus, StrategyRunRecord};

/// Repository for run ledger rows.
#[derive(Debug, Clone)]
pub struct StrategyRunRepository {
    pool: PgPool,
}

impl StrategyRunRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claims the `(instance, asof)` slot and returns the new run id, or
    /// `None` when another trigger already holds it.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn start(
        &self,
        strategy_instance_id: i64,
        strategy_id: &str,
        asof_ts: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"
            INSERT INTO strategy_runs
                (strategy_instance_id, strategy_id, asof_ts, status, started_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (strategy_instance_id, asof_ts) DO NOTHING
            RETURNING id
            ",
        )
        .bind(strategy_instance_id)
        .bind(strategy_id)
        .bind(asof_ts)
        .bind(RunStatus::Started.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Marks a run failed with its error code and message.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn fail(&self, run_id: i64, error_code: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE strategy_runs
            SET status = $2, error_code = $3, error_message = $4, completed_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(run_id)
        .bind(RunStatus::Failed.as_str())
        .bind(error_code)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recent runs for one instance, newest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn recent_for_instance(
        &self,
        strategy_instance_id: i64,
        limit: i64,
    ) -> Result<Vec<StrategyRunRecord>> {
        let records = sqlx::query_as::<_, StrategyRunRecord>(
            r"
            SELECT id, strategy_instance_id, strategy_id, asof_ts, status,
                   stats, error_code, error_message, started_at, completed_at
            FROM strategy_runs
            WHERE strategy_instance_id = $1
            ORDER BY asof_ts DESC
            LIMIT $2
            ",
        )
        .bind(strategy_instance_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Gets one run by id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, run_id: i64) -> Result<Option<StrategyRunRecord>> {
        let record = sqlx::query_as::<_, StrategyRunRecord>(
            r"
            SELECT id, strategy_instance_id, strategy_id, asof_ts, status,
                   stats, error_code, error_message, started_at, completed_at
            FROM strategy_runs
            WHERE id = $1
            ",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
