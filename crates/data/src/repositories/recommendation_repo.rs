//! Read access to persisted recommendation rows.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::RecommendationRecord;

/// Repository for recommendation rows. Writes happen only inside the
/// persistence coordinator's transaction.
#[derive(Debug, Clone)]
pub struct RecommendationRepository {
    pool: PgPool,
}

impl RecommendationRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All recommendations persisted for one run.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_for_run(&self, run_id: i64) -> Result<Vec<RecommendationRecord>> {
        let records = sqlx::query_as::<_, RecommendationRecord>(
            r"
            SELECT id, run_id, identity_key, underlier, action, params,
                   confidence, rationale, status, reject_code, reject_message,
                   created_at
            FROM recommendations
            WHERE run_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
