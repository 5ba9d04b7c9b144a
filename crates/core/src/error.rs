//! Engine error taxonomy.
//!
//! Validation errors block run creation and surface synchronously; data and
//! evaluation errors are isolated per instance and end as failed ledger
//! rows. Risk rejections are data, not errors, and persistence conflicts
//! resolve to no-op successes — neither appears here.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::schema::Violation;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Config failed schema validation. Surfaced to the caller before any
    /// run ledger row exists; the run is never started.
    #[error("config validation failed with {} violation(s)", .0.len())]
    ConfigValidation(Vec<Violation>),

    /// No account snapshot exists at or before the requested as-of time.
    /// The engine never synthesizes a zero-state snapshot.
    #[error("no account snapshot at or before {asof_ts}")]
    MissingSnapshot { asof_ts: DateTime<Utc> },

    /// No implementation is registered for the strategy identifier.
    #[error("no strategy registered for '{0}'")]
    UnknownStrategy(String),

    /// Unexpected fault inside a variant's evaluate. Caught at the runner
    /// boundary and recorded on the failed run.
    #[error("strategy evaluation failed: {0}")]
    Evaluation(String),

    /// Evaluation exceeded the configured time budget.
    #[error("evaluation exceeded time budget of {budget_secs}s")]
    Timeout { budget_secs: u64 },
}

impl EngineError {
    /// Stable machine-readable code recorded in the run ledger.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigValidation(_) => "config_validation",
            Self::MissingSnapshot { .. } => "missing_snapshot",
            Self::UnknownStrategy(_) => "unknown_strategy",
            Self::Evaluation(_) => "evaluation",
            Self::Timeout { .. } => "timeout",
        }
    }
}
