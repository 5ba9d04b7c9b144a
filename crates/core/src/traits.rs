//! The strategy evaluation contract.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::actions::Actions;
use crate::context::StrategyContext;

/// Stable identifier of a published strategy version, e.g. `wheel@v1`.
///
/// Versions are immutable after publication; changing the rules or the
/// config contract means publishing a new version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyId {
    pub slug: String,
    pub version: String,
}

impl StrategyId {
    #[must_use]
    pub fn new(slug: &str, version: &str) -> Self {
        Self {
            slug: slug.to_string(),
            version: version.to_string(),
        }
    }

    /// Parses `slug@version`. Returns `None` when either part is empty.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (slug, version) = s.split_once('@')?;
        if slug.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(slug, version))
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.slug, self.version)
    }
}

/// A strategy implementation.
///
/// `evaluate` must be a pure function of the context: no I/O, no mutation,
/// no clock reads, no randomness. Re-invocation with the same context must
/// reproduce the same `Actions` exactly — this is what makes runs
/// replayable and idempotent persistence possible. There is deliberately no
/// `&mut self`: strategies hold configuration defaults at most, never state.
pub trait Strategy: Send + Sync {
    /// The version identifier this implementation realizes.
    fn id(&self) -> StrategyId;

    /// Evaluates one context into candidate actions.
    fn evaluate(&self, ctx: &StrategyContext) -> Result<Actions>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_id_round_trips() {
        let id = StrategyId::parse("wheel@v1").unwrap();
        assert_eq!(id.slug, "wheel");
        assert_eq!(id.version, "v1");
        assert_eq!(id.to_string(), "wheel@v1");
    }

    #[test]
    fn strategy_id_rejects_malformed() {
        assert!(StrategyId::parse("wheel").is_none());
        assert!(StrategyId::parse("@v1").is_none());
        assert!(StrategyId::parse("wheel@").is_none());
    }
}
