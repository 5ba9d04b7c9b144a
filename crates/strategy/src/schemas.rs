//! Config contracts for the built-in strategy versions.
//!
//! Schemas are data, declared once per published version. The validator in
//! `wheelhouse_core::schema` does the rest.

use serde_json::json;
use wheelhouse_core::{ConfigSchema, FieldKind, FieldSpec};

fn number(min: f64, max: f64) -> FieldKind {
    FieldKind::Number {
        min: Some(min),
        max: Some(max),
    }
}

fn integer(min: i64, max: i64) -> FieldKind {
    FieldKind::Integer {
        min: Some(min),
        max: Some(max),
    }
}

fn universe() -> FieldSpec {
    FieldSpec::required("universe", FieldKind::SymbolList { min_items: 1 })
}

fn liquidity_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::optional("min_open_interest", integer(0, 1_000_000)).with_default(json!(100)),
        FieldSpec::optional("max_spread_fraction", number(0.0, 1.0)).with_default(json!(0.10)),
    ]
}

/// Contract for `wheel@v1`.
#[must_use]
pub fn wheel_v1() -> ConfigSchema {
    let mut fields = vec![
        universe(),
        FieldSpec::required("put_delta_target", number(0.0, 1.0)),
        FieldSpec::optional("put_days_out", integer(1, 90)).with_default(json!(7)),
        FieldSpec::optional("dte_tolerance_days", integer(0, 30)).with_default(json!(3)),
        FieldSpec::optional("delta_band", number(0.0, 0.5)).with_default(json!(0.05)),
        FieldSpec::optional("profit_capture_fraction", number(0.0, 1.0)).with_default(json!(0.70)),
        FieldSpec::optional("roll_dte_threshold", integer(0, 30)).with_default(json!(3)),
        FieldSpec::optional("earnings_buffer_days", integer(0, 30)).with_default(json!(7)),
        FieldSpec::optional("call_delta_target", number(0.0, 1.0)).with_default(json!(0.25)),
        FieldSpec::optional("call_days_out", integer(1, 120)).with_default(json!(30)),
        FieldSpec::optional("max_positions", integer(1, 100)).with_default(json!(5)),
    ];
    fields.extend(liquidity_fields());
    ConfigSchema::new(fields)
}

/// Contract for `theta_farm@v1`.
#[must_use]
pub fn theta_farm_v1() -> ConfigSchema {
    let mut fields = vec![
        universe(),
        FieldSpec::optional("min_dte", integer(1, 365)).with_default(json!(30)),
        FieldSpec::optional("max_dte", integer(1, 365)).with_default(json!(60)),
        FieldSpec::optional("target_delta", number(0.0, 1.0)).with_default(json!(0.16)),
        FieldSpec::optional("delta_band", number(0.0, 0.5)).with_default(json!(0.05)),
        FieldSpec::optional("max_margin_utilization", number(0.0, 1.0)).with_default(json!(0.5)),
        FieldSpec::optional("max_positions", integer(1, 100)).with_default(json!(5)),
    ];
    fields.extend(liquidity_fields());
    ConfigSchema::new(fields)
}

/// Contract for `covered_call@v1`.
#[must_use]
pub fn covered_call_v1() -> ConfigSchema {
    let mut fields = vec![
        universe(),
        FieldSpec::optional("call_delta_target", number(0.0, 1.0)).with_default(json!(0.25)),
        FieldSpec::optional("call_days_out", integer(1, 120)).with_default(json!(30)),
        FieldSpec::optional("dte_tolerance_days", integer(0, 30)).with_default(json!(5)),
        FieldSpec::optional("delta_band", number(0.0, 0.5)).with_default(json!(0.05)),
        FieldSpec::optional("profit_capture_fraction", number(0.0, 1.0)).with_default(json!(0.70)),
        FieldSpec::optional("roll_dte_threshold", integer(0, 30)).with_default(json!(5)),
        FieldSpec::optional("earnings_buffer_days", integer(0, 30)).with_default(json!(7)),
    ];
    fields.extend(liquidity_fields());
    ConfigSchema::new(fields)
}

/// Contract for `synthetic_leaps@v1`.
#[must_use]
pub fn synthetic_leaps_v1() -> ConfigSchema {
    let mut fields = vec![
        universe(),
        FieldSpec::optional("leaps_min_dte", integer(180, 1095)).with_default(json!(365)),
        FieldSpec::optional("leaps_delta_target", number(0.0, 1.0)).with_default(json!(0.80)),
        FieldSpec::optional("leaps_roll_dte_threshold", integer(30, 365)).with_default(json!(180)),
        FieldSpec::optional("delta_band", number(0.0, 0.5)).with_default(json!(0.10)),
        FieldSpec::optional("call_delta_target", number(0.0, 1.0)).with_default(json!(0.25)),
        FieldSpec::optional("call_days_out", integer(1, 120)).with_default(json!(30)),
        FieldSpec::optional("max_synthetic_delta_shares", integer(100, 100_000))
            .with_default(json!(500)),
    ];
    fields.extend(liquidity_fields());
    ConfigSchema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;
    use wheelhouse_core::ConfigMap;

    fn config(value: JsonValue) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn wheel_accepts_minimal_config() {
        let cfg = config(json!({
            "universe": ["AAPL"],
            "put_delta_target": 0.20,
        }));
        assert!(wheel_v1().validate(&cfg).is_empty());
    }

    #[test]
    fn wheel_requires_delta_target() {
        let cfg = config(json!({"universe": ["AAPL"]}));
        let violations = wheel_v1().validate(&cfg);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "put_delta_target");
    }

    #[test]
    fn wheel_defaults_cover_tuning_knobs() {
        let defaults = wheel_v1().defaults();
        assert_eq!(defaults["put_days_out"], json!(7));
        assert_eq!(defaults["profit_capture_fraction"], json!(0.70));
        assert_eq!(defaults["min_open_interest"], json!(100));
        assert!(!defaults.contains_key("universe"));
    }

    #[test]
    fn theta_farm_rejects_out_of_range_utilization() {
        let cfg = config(json!({
            "universe": ["SPY"],
            "max_margin_utilization": 1.5,
        }));
        let violations = theta_farm_v1().validate(&cfg);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "max_margin_utilization");
    }

    #[test]
    fn covered_call_universe_only_is_valid() {
        let cfg = config(json!({"universe": ["MSFT", "AAPL"]}));
        assert!(covered_call_v1().validate(&cfg).is_empty());
    }

    #[test]
    fn synthetic_leaps_floors_leaps_dte() {
        let cfg = config(json!({
            "universe": ["AAPL"],
            "leaps_min_dte": 90,
        }));
        let violations = synthetic_leaps_v1().validate(&cfg);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "leaps_min_dte");
    }
}
