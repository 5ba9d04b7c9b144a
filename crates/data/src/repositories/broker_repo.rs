//! Read-only access to persisted broker state.
//!
//! All queries are point-in-time: they answer "what did we know at or
//! before `asof`", never "what is true now", so a context rebuilt later
//! from the same inputs is identical.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::models::{
    AccountSnapshotRecord, ChainQuoteRecord, ExecutionRecord, OpenOrderRecord, PositionRecord,
};

/// Repository over the ingestion collaborator's tables.
#[derive(Debug, Clone)]
pub struct BrokerStateRepository {
    pool: PgPool,
}

impl BrokerStateRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The latest account snapshot at or before `asof`, if any exists.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn latest_snapshot_at_or_before(
        &self,
        broker_account: &str,
        asof: DateTime<Utc>,
    ) -> Result<Option<AccountSnapshotRecord>> {
        let record = sqlx::query_as::<_, AccountSnapshotRecord>(
            r"
            SELECT broker_account, cash, buying_power, maintenance_margin,
                   used_margin, asof_ts
            FROM account_snapshots
            WHERE broker_account = $1 AND asof_ts <= $2
            ORDER BY asof_ts DESC
            LIMIT 1
            ",
        )
        .bind(broker_account)
        .bind(asof)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Position rows from the most recent broker sync at or before `asof`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn positions_at(
        &self,
        broker_account: &str,
        asof: DateTime<Utc>,
    ) -> Result<Vec<PositionRecord>> {
        let records = sqlx::query_as::<_, PositionRecord>(
            r#"
            SELECT broker_account, symbol, sec_type, "right", strike, expiry,
                   qty, avg_cost, market_price, asof_ts
            FROM positions
            WHERE broker_account = $1
              AND asof_ts = (
                  SELECT MAX(asof_ts) FROM positions
                  WHERE broker_account = $1 AND asof_ts <= $2
              )
            ORDER BY symbol, sec_type, strike
            "#,
        )
        .bind(broker_account)
        .bind(asof)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Working orders from the most recent order sync at or before `asof`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn open_orders_at(
        &self,
        broker_account: &str,
        asof: DateTime<Utc>,
    ) -> Result<Vec<OpenOrderRecord>> {
        let records = sqlx::query_as::<_, OpenOrderRecord>(
            r#"
            SELECT broker_account, symbol, sec_type, "right", strike, expiry,
                   side, qty
            FROM open_orders
            WHERE broker_account = $1
              AND asof_ts = (
                  SELECT MAX(asof_ts) FROM open_orders
                  WHERE broker_account = $1 AND asof_ts <= $2
              )
            ORDER BY symbol, side
            "#,
        )
        .bind(broker_account)
        .bind(asof)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Fills in the window `(asof - lookback_days, asof]`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn executions_within(
        &self,
        broker_account: &str,
        asof: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<Vec<ExecutionRecord>> {
        let cutoff = asof - chrono::Duration::days(lookback_days);
        let records = sqlx::query_as::<_, ExecutionRecord>(
            r"
            SELECT broker_account, symbol, qty, price, fill_ts
            FROM executions
            WHERE broker_account = $1 AND fill_ts > $2 AND fill_ts <= $3
            ORDER BY fill_ts ASC
            ",
        )
        .bind(broker_account)
        .bind(cutoff)
        .bind(asof)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Quotes from the most recent chain pull for one underlier at or
    /// before `asof`.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn chain_at(
        &self,
        underlier: &str,
        asof: DateTime<Utc>,
    ) -> Result<Vec<ChainQuoteRecord>> {
        let records = sqlx::query_as::<_, ChainQuoteRecord>(
            r#"
            SELECT underlier, "right", strike, expiry, bid, ask, delta,
                   open_interest, asof_ts
            FROM chain_quotes
            WHERE underlier = $1
              AND asof_ts = (
                  SELECT MAX(asof_ts) FROM chain_quotes
                  WHERE underlier = $1 AND asof_ts <= $2
              )
            ORDER BY expiry, "right", strike
            "#,
        )
        .bind(underlier)
        .bind(asof)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Next known earnings date per requested symbol.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn earnings_for(
        &self,
        symbols: &[String],
        asof: DateTime<Utc>,
    ) -> Result<Vec<(String, NaiveDate)>> {
        let rows: Vec<(String, NaiveDate)> = sqlx::query_as(
            r"
            SELECT DISTINCT ON (symbol) symbol, earnings_date
            FROM earnings_calendar
            WHERE symbol = ANY($1) AND earnings_date >= $2
            ORDER BY symbol, earnings_date ASC
            ",
        )
        .bind(symbols)
        .bind(asof.date_naive())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
