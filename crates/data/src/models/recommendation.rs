//! Persisted recommendation rows, keyed by their deterministic identity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Risk filter disposition stored with every recommendation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationStatus {
    Approved,
    Rejected,
}

impl RecommendationStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecommendationRecord {
    pub id: i64,
    pub run_id: i64,
    /// Hash of the natural key; the unique index on this column is what
    /// makes re-persistence a no-op.
    pub identity_key: String,
    pub underlier: String,
    pub action: String,
    pub params: JsonValue,
    pub confidence: Decimal,
    pub rationale: String,
    pub status: String,
    pub reject_code: Option<String>,
    pub reject_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
