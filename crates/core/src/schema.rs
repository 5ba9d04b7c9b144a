//! Declarative config schemas and the generic validator.
//!
//! Each strategy version publishes its config contract as a data table of
//! [`FieldSpec`]s. The validator walks the whole config and collects every
//! violation instead of stopping at the first, so operators see the complete
//! defect list in one pass. Unknown fields are violations: schemas are
//! closed, and evolving a contract means publishing a new version.

use serde_json::Value as JsonValue;
use std::fmt;

/// Instance configuration: a JSON object mapping field names to values.
pub type ConfigMap = serde_json::Map<String, JsonValue>;

/// Value constraint for one config field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Bool,
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Text,
    /// Non-empty list of ticker symbols.
    SymbolList { min_items: usize },
    Choice { options: &'static [&'static str] },
}

/// One field in a strategy version's config contract.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<JsonValue>,
}

impl FieldSpec {
    #[must_use]
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    #[must_use]
    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    /// Sets the schema-level default applied in the middle config tier.
    #[must_use]
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// A single schema violation, addressable by field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    #[must_use]
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The versioned, immutable config contract of one strategy version.
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    fields: Vec<FieldSpec>,
}

impl ConfigSchema {
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Schema-level defaults for every field that declares one.
    #[must_use]
    pub fn defaults(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        for field in &self.fields {
            if let Some(default) = &field.default {
                map.insert(field.name.to_string(), default.clone());
            }
        }
        map
    }

    /// Validates a config against this schema, collecting **all** violations.
    ///
    /// An empty result means the config is valid.
    #[must_use]
    pub fn validate(&self, config: &ConfigMap) -> Vec<Violation> {
        let mut violations = Vec::new();

        for field in &self.fields {
            if field.required && !config.contains_key(field.name) {
                violations.push(Violation::new(field.name, "missing required field"));
            }
        }

        for (name, value) in config {
            match self.field(name) {
                None => violations.push(Violation::new(name, "unknown field")),
                Some(field) => {
                    if let Some(violation) = check_value(field, value) {
                        violations.push(violation);
                    }
                }
            }
        }

        violations
    }
}

fn check_value(field: &FieldSpec, value: &JsonValue) -> Option<Violation> {
    match &field.kind {
        FieldKind::Bool => {
            if !value.is_boolean() {
                return Some(Violation::new(field.name, "expected boolean"));
            }
        }
        FieldKind::Integer { min, max } => {
            let Some(n) = value.as_i64() else {
                return Some(Violation::new(field.name, "expected integer"));
            };
            if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                return Some(Violation::new(
                    field.name,
                    format!("value {n} outside range {}", range_text(*min, *max)),
                ));
            }
        }
        FieldKind::Number { min, max } => {
            let Some(n) = value.as_f64() else {
                return Some(Violation::new(field.name, "expected number"));
            };
            if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                return Some(Violation::new(
                    field.name,
                    format!("value {n} outside range {}", range_text(*min, *max)),
                ));
            }
        }
        FieldKind::Text => {
            if !value.is_string() {
                return Some(Violation::new(field.name, "expected string"));
            }
        }
        FieldKind::SymbolList { min_items } => {
            let Some(items) = value.as_array() else {
                return Some(Violation::new(field.name, "expected array of symbols"));
            };
            if items.len() < *min_items {
                return Some(Violation::new(
                    field.name,
                    format!("expected at least {min_items} symbol(s)"),
                ));
            }
            if items.iter().any(|item| !item.is_string()) {
                return Some(Violation::new(field.name, "symbols must be strings"));
            }
        }
        FieldKind::Choice { options } => {
            let valid = value.as_str().is_some_and(|s| options.contains(&s));
            if !valid {
                return Some(Violation::new(
                    field.name,
                    format!("expected one of {options:?}"),
                ));
            }
        }
    }
    None
}

fn range_text<T: fmt::Display>(min: Option<T>, max: Option<T>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("[{lo}, {hi}]"),
        (Some(lo), None) => format!("[{lo}, ..]"),
        (None, Some(hi)) => format!("[.., {hi}]"),
        (None, None) => "(unbounded)".to_string(),
    }
}

/// Merges the three config tiers. Later tiers win per key:
/// global defaults < schema defaults < instance overrides.
#[must_use]
pub fn merge_config(global: &ConfigMap, schema: &ConfigSchema, overrides: &ConfigMap) -> ConfigMap {
    let mut merged = global.clone();
    for (key, value) in schema.defaults() {
        merged.insert(key, value);
    }
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> ConfigSchema {
        ConfigSchema::new(vec![
            FieldSpec::required("universe", FieldKind::SymbolList { min_items: 1 }),
            FieldSpec::required(
                "put_delta_target",
                FieldKind::Number {
                    min: Some(0.0),
                    max: Some(1.0),
                },
            ),
            FieldSpec::optional(
                "put_days_out",
                FieldKind::Integer {
                    min: Some(1),
                    max: Some(90),
                },
            )
            .with_default(json!(7)),
            FieldSpec::optional("enabled", FieldKind::Bool),
            FieldSpec::optional(
                "mode",
                FieldKind::Choice {
                    options: &["conservative", "aggressive"],
                },
            ),
        ])
    }

    fn config(value: JsonValue) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    // ============================================
    // Validation Tests
    // ============================================

    #[test]
    fn valid_config_has_no_violations() {
        let schema = sample_schema();
        let cfg = config(json!({
            "universe": ["AAPL"],
            "put_delta_target": 0.20,
            "put_days_out": 7,
            "enabled": true,
            "mode": "conservative",
        }));
        assert!(schema.validate(&cfg).is_empty());
    }

    #[test]
    fn two_independent_violations_are_both_reported() {
        let schema = sample_schema();
        // Bad delta range AND bad days type: both must surface.
        let cfg = config(json!({
            "universe": ["AAPL"],
            "put_delta_target": 1.5,
            "put_days_out": "soon",
        }));
        let violations = schema.validate(&cfg);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.field == "put_delta_target"));
        assert!(violations.iter().any(|v| v.field == "put_days_out"));
    }

    #[test]
    fn missing_required_fields_all_reported() {
        let schema = sample_schema();
        let violations = schema.validate(&ConfigMap::new());
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.field == "universe"));
        assert!(violations.iter().any(|v| v.field == "put_delta_target"));
    }

    #[test]
    fn unknown_field_is_a_violation() {
        let schema = sample_schema();
        let cfg = config(json!({
            "universe": ["AAPL"],
            "put_delta_target": 0.2,
            "surprise": 1,
        }));
        let violations = schema.validate(&cfg);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "surprise");
    }

    #[test]
    fn empty_symbol_list_rejected() {
        let schema = sample_schema();
        let cfg = config(json!({
            "universe": [],
            "put_delta_target": 0.2,
        }));
        let violations = schema.validate(&cfg);
        assert!(violations
            .iter()
            .any(|v| v.field == "universe" && v.message.contains("at least 1")));
    }

    #[test]
    fn integer_field_rejects_float() {
        let schema = sample_schema();
        let cfg = config(json!({
            "universe": ["AAPL"],
            "put_delta_target": 0.2,
            "put_days_out": 7.5,
        }));
        let violations = schema.validate(&cfg);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "put_days_out");
    }

    #[test]
    fn choice_field_rejects_unknown_option() {
        let schema = sample_schema();
        let cfg = config(json!({
            "universe": ["AAPL"],
            "put_delta_target": 0.2,
            "mode": "yolo",
        }));
        let violations = schema.validate(&cfg);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("one of"));
    }

    // ============================================
    // Merge Tests
    // ============================================

    #[test]
    fn merge_tiers_instance_overrides_win() {
        let schema = sample_schema();
        let global = config(json!({"put_days_out": 14, "enabled": true}));
        let overrides = config(json!({"put_days_out": 3}));

        let merged = merge_config(&global, &schema, &overrides);

        // Schema default (7) beat global (14); instance (3) beat both.
        assert_eq!(merged["put_days_out"], json!(3));
        assert_eq!(merged["enabled"], json!(true));
    }

    #[test]
    fn merge_schema_defaults_beat_global() {
        let schema = sample_schema();
        let global = config(json!({"put_days_out": 30}));
        let merged = merge_config(&global, &schema, &ConfigMap::new());
        assert_eq!(merged["put_days_out"], json!(7));
    }

    #[test]
    fn merge_is_deterministic() {
        let schema = sample_schema();
        let global = config(json!({"a": 1}));
        let overrides = config(json!({"universe": ["AAPL"]}));
        let a = merge_config(&global, &schema, &overrides);
        let b = merge_config(&global, &schema, &overrides);
        assert_eq!(JsonValue::Object(a), JsonValue::Object(b));
    }
}
