//! Strategy instance rows: one strategy version bound to one portfolio.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use wheelhouse_core::{ConfigMap, RiskMode, StrategyId};

/// One configured deployment of a strategy version. Two instances never
/// share state: each carries its own config, account binding, and risk mode.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StrategyInstanceRecord {
    pub id: i64,
    pub client: String,
    pub portfolio: String,
    pub broker_account: String,
    pub strategy_slug: String,
    pub strategy_version: String,
    pub risk_mode: String,
    /// Instance config overrides, validated against the version schema.
    pub config: JsonValue,
    pub enabled: bool,
}

impl StrategyInstanceRecord {
    #[must_use]
    pub fn strategy_id(&self) -> StrategyId {
        StrategyId::new(&self.strategy_slug, &self.strategy_version)
    }

    /// # Errors
    /// Returns an error when the stored risk mode string is unrecognized.
    pub fn risk_mode(&self) -> Result<RiskMode> {
        RiskMode::parse(&self.risk_mode)
            .ok_or_else(|| anyhow!("instance {} has invalid risk mode '{}'", self.id, self.risk_mode))
    }

    /// Config overrides as a map; a non-object config counts as empty.
    #[must_use]
    pub fn config_map(&self) -> ConfigMap {
        self.config.as_object().cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(risk_mode: &str, config: JsonValue) -> StrategyInstanceRecord {
        StrategyInstanceRecord {
            id: 7,
            client: "acme".to_string(),
            portfolio: "income".to_string(),
            broker_account: "U1234567".to_string(),
            strategy_slug: "wheel".to_string(),
            strategy_version: "v1".to_string(),
            risk_mode: risk_mode.to_string(),
            config,
            enabled: true,
        }
    }

    #[test]
    fn strategy_id_joins_slug_and_version() {
        assert_eq!(
            record("margin", json!({})).strategy_id().to_string(),
            "wheel@v1"
        );
    }

    #[test]
    fn invalid_risk_mode_is_an_error() {
        assert!(record("margin", json!({})).risk_mode().is_ok());
        assert!(record("yolo", json!({})).risk_mode().is_err());
    }

    #[test]
    fn non_object_config_is_empty() {
        assert!(record("margin", json!(null)).config_map().is_empty());
        let map = record("margin", json!({"universe": ["AAPL"]})).config_map();
        assert_eq!(map["universe"], json!(["AAPL"]));
    }
}
