//! Transactional persistence of one run's output.
//!
//! Everything a run produced commits atomically with its ledger row flip to
//! `succeeded`: either all signals, opportunities, and recommendations land
//! together, or none do and the run stays non-terminal. Recommendation
//! inserts are keyed on the deterministic identity hash, so re-persisting
//! the same logical output is a no-op rather than a duplicate.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::info;

use wheelhouse_core::{Actions, Recommendation};

use crate::models::{RecommendationStatus, RunStatus};

/// How the risk filter disposed of one recommendation, ready to persist.
pub struct RecommendationDisposition<'a> {
    pub recommendation: &'a Recommendation,
    pub status: RecommendationStatus,
    pub reject_code: Option<&'static str>,
    pub reject_message: Option<String>,
}

/// Commits run output in a single transaction.
#[derive(Debug, Clone)]
pub struct PersistenceCoordinator {
    pool: PgPool,
}

impl PersistenceCoordinator {
    /// Creates a new coordinator on the shared pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persists all output of a successful run and flips its ledger row to
    /// `succeeded`, atomically.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; the run row is left
    /// non-terminal and no partial output is visible.
    pub async fn commit_success(
        &self,
        run_id: i64,
        instance_id: i64,
        asof_ts: DateTime<Utc>,
        actions: &Actions,
        dispositions: &[RecommendationDisposition<'_>],
        stats: JsonValue,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for signal in &actions.signals {
            sqlx::query(
                r"
                INSERT INTO signals (run_id, signal_type, underlier, payload)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(run_id)
            .bind(&signal.signal_type)
            .bind(&signal.underlier)
            .bind(&signal.payload)
            .execute(&mut *tx)
            .await?;
        }

        for opportunity in &actions.opportunities {
            sqlx::query(
                r"
                INSERT INTO opportunities
                    (run_id, underlier, contract_key, metrics, required_margin)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(run_id)
            .bind(&opportunity.underlier)
            .bind(opportunity.contract.as_ref().map(|c| c.key()))
            .bind(&opportunity.metrics)
            .bind(opportunity.required_margin)
            .execute(&mut *tx)
            .await?;
        }

        for disposition in dispositions {
            let rec = disposition.recommendation;
            sqlx::query(
                r"
                INSERT INTO recommendations
                    (run_id, identity_key, underlier, action, params, confidence,
                     rationale, status, reject_code, reject_message, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
                ON CONFLICT (identity_key) DO NOTHING
                ",
            )
            .bind(run_id)
            .bind(rec.identity_key(instance_id, asof_ts))
            .bind(&rec.underlier)
            .bind(rec.action.as_str())
            .bind(&rec.params)
            .bind(rec.confidence)
            .bind(&rec.rationale)
            .bind(disposition.status.as_str())
            .bind(disposition.reject_code)
            .bind(&disposition.reject_message)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r"
            UPDATE strategy_runs
            SET status = $2, stats = $3, completed_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(run_id)
        .bind(RunStatus::Succeeded.as_str())
        .bind(&stats)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            run_id,
            signals = actions.signals.len(),
            opportunities = actions.opportunities.len(),
            recommendations = dispositions.len(),
            "run output committed"
        );
        Ok(())
    }
}
