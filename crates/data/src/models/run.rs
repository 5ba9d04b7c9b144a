//! Run ledger rows: one per (instance, as-of) trigger that won the fence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Lifecycle of a run ledger row.
///
/// `Started` rows either advance to a terminal state or remain behind as
/// evidence of a crashed run; they are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Started,
    Succeeded,
    Failed,
}

impl RunStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "started" => Some(Self::Started),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StrategyRunRecord {
    pub id: i64,
    pub strategy_instance_id: i64,
    pub strategy_id: String,
    pub asof_ts: DateTime<Utc>,
    pub status: String,
    /// Output counts and timings, populated on success.
    pub stats: Option<JsonValue>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StrategyRunRecord {
    #[must_use]
    pub fn status(&self) -> Option<RunStatus> {
        RunStatus::parse(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [RunStatus::Started, RunStatus::Succeeded, RunStatus::Failed] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("exploded"), None);
    }
}
