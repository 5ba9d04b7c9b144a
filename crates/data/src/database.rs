use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

use wheelhouse_core::DatabaseConfig;

/// Opens a connection pool against the configured `PostgreSQL` database.
///
/// # Errors
/// Returns an error if the database connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}
