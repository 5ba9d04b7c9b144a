//! The process-wide strategy registry.
//!
//! Maps strategy version identifiers to their implementation and config
//! contract. Registration happens at startup; resolution at run time never
//! falls back, an unknown identifier is an error.

use std::collections::HashMap;
use std::fmt;

use wheelhouse_core::{
    ConfigMap, ConfigSchema, EngineError, Strategy, StrategyId, Violation,
};

use crate::covered_call::CoveredCallStrategy;
use crate::schemas;
use crate::synthetic_leaps::SyntheticLeapsStrategy;
use crate::theta::ThetaFarmStrategy;
use crate::wheel::WheelStrategy;

/// An implementation paired with its published config contract.
pub struct RegisteredStrategy {
    pub strategy: Box<dyn Strategy>,
    pub schema: ConfigSchema,
}

impl std::fmt::Debug for RegisteredStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredStrategy")
            .field("strategy", &self.strategy.id())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct StrategyRegistry {
    entries: HashMap<String, RegisteredStrategy>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in strategy version.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(WheelStrategy), schemas::wheel_v1());
        registry.register(Box::new(ThetaFarmStrategy), schemas::theta_farm_v1());
        registry.register(Box::new(CoveredCallStrategy), schemas::covered_call_v1());
        registry.register(
            Box::new(SyntheticLeapsStrategy),
            schemas::synthetic_leaps_v1(),
        );
        registry
    }

    /// Registers under the strategy's own id, replacing any previous entry.
    pub fn register(&mut self, strategy: Box<dyn Strategy>, schema: ConfigSchema) {
        let id = strategy.id().to_string();
        self.entries
            .insert(id, RegisteredStrategy { strategy, schema });
    }

    /// Resolves a version identifier.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownStrategy`] when nothing is registered
    /// under the identifier.
    pub fn resolve(&self, id: &StrategyId) -> Result<&RegisteredStrategy, EngineError> {
        self.entries
            .get(&id.to_string())
            .ok_or_else(|| EngineError::UnknownStrategy(id.to_string()))
    }

    /// Validates instance overrides against the version's schema.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownStrategy`] for an unregistered id.
    pub fn validate(&self, id: &StrategyId, config: &ConfigMap) -> Result<Vec<Violation>, EngineError> {
        Ok(self.resolve(id)?.schema.validate(config))
    }

    /// Registered identifiers in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_registers_all_versions() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(
            registry.ids(),
            vec![
                "covered_call@v1",
                "synthetic_leaps@v1",
                "theta_farm@v1",
                "wheel@v1",
            ]
        );
    }

    #[test]
    fn resolve_unknown_id_is_an_error() {
        let registry = StrategyRegistry::builtin();
        let err = registry
            .resolve(&StrategyId::new("wheel", "v9"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownStrategy(ref id) if id == "wheel@v9"));
    }

    #[test]
    fn resolved_entry_carries_matching_id() {
        let registry = StrategyRegistry::builtin();
        let id = StrategyId::new("theta_farm", "v1");
        let entry = registry.resolve(&id).unwrap();
        assert_eq!(entry.strategy.id(), id);
    }

    #[test]
    fn validate_routes_to_the_version_schema() {
        let registry = StrategyRegistry::builtin();
        let config = json!({"universe": ["AAPL"], "put_delta_target": 0.2})
            .as_object()
            .cloned()
            .unwrap();

        let violations = registry
            .validate(&StrategyId::new("wheel", "v1"), &config)
            .unwrap();
        assert!(violations.is_empty());

        // The same config is invalid for theta_farm: unknown field.
        let violations = registry
            .validate(&StrategyId::new("theta_farm", "v1"), &config)
            .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "put_delta_target");
    }
}
