//! Actions emitted by strategy evaluation.
//!
//! Strategies produce three grades of output: diagnostic [`Signal`]s,
//! candidate [`Opportunity`]s with metrics, and actionable
//! [`Recommendation`]s. All three are persisted together with the run
//! ledger row, or not at all.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::instrument::OptionContract;

/// Canonical signal type strings shared across strategies.
pub mod signal_types {
    /// Universe entry screened out, payload explains why.
    pub const SCREEN_OUT: &str = "screen_out";
    /// Realized/unrealized P&L state of an open short option.
    pub const PROFIT_CAPTURE_STATUS: &str = "profit_capture_status";
    /// Metrics for a candidate trade (return on risk, margin, delta, DTE).
    pub const CANDIDATE_ROR: &str = "candidate_ror";
    /// A configured risk limit was breached.
    pub const RISK_LIMIT_HIT: &str = "risk_limit_hit";
    /// Free-form per-run diagnostics.
    pub const DIAGNOSTIC: &str = "diagnostic";
}

/// The kind of trade a recommendation proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    SellPut,
    SellCall,
    RollPut,
    RollCall,
    Close,
    BuyLeaps,
    RollLeaps,
}

impl ActionKind {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SellPut => "sell_put",
            Self::SellCall => "sell_call",
            Self::RollPut => "roll_put",
            Self::RollCall => "roll_call",
            Self::Close => "close",
            Self::BuyLeaps => "buy_leaps",
            Self::RollLeaps => "roll_leaps",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sell_put" => Some(Self::SellPut),
            "sell_call" => Some(Self::SellCall),
            "roll_put" => Some(Self::RollPut),
            "roll_call" => Some(Self::RollCall),
            "close" => Some(Self::Close),
            "buy_leaps" => Some(Self::BuyLeaps),
            "roll_leaps" => Some(Self::RollLeaps),
            _ => None,
        }
    }

    /// True when the action opens or increases short option exposure.
    #[must_use]
    pub fn opens_short_exposure(&self) -> bool {
        matches!(
            self,
            Self::SellPut | Self::SellCall | Self::RollPut | Self::RollCall
        )
    }
}

/// A diagnostic observation. Not actionable on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: String,
    pub underlier: Option<String>,
    pub payload: JsonValue,
}

impl Signal {
    #[must_use]
    pub fn new(signal_type: &str, underlier: Option<&str>, payload: JsonValue) -> Self {
        Self {
            signal_type: signal_type.to_string(),
            underlier: underlier.map(str::to_string),
            payload,
        }
    }
}

/// A candidate trade context with metrics. Not yet a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub underlier: String,
    pub contract: Option<OptionContract>,
    pub metrics: JsonValue,
    pub required_margin: Option<Decimal>,
}

/// An actionable trade proposal for downstream review or execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: ActionKind,
    pub underlier: String,
    pub params: JsonValue,
    /// Confidence score, 0-100.
    pub confidence: Decimal,
    pub rationale: String,
}

impl Recommendation {
    /// Deterministic identity key over the natural-key fields.
    ///
    /// Two recommendations produced from the same (instance, asOf, underlier,
    /// action, parameter set) hash to the same key, whatever the JSON key
    /// order of `params` was. This is the idempotency anchor for persistence.
    #[must_use]
    pub fn identity_key(&self, instance_id: i64, asof_ts: DateTime<Utc>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(instance_id.to_le_bytes());
        hasher.update(asof_ts.timestamp_micros().to_le_bytes());
        hasher.update(self.underlier.as_bytes());
        hasher.update(self.action.as_str().as_bytes());
        hasher.update(canonical_json(&self.params).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Everything one evaluation produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actions {
    pub signals: Vec<Signal>,
    pub opportunities: Vec<Opportunity>,
    pub recommendations: Vec<Recommendation>,
}

impl Actions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_signal(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    pub fn push_opportunity(&mut self, opportunity: Opportunity) {
        self.opportunities.push(opportunity);
    }

    pub fn push_recommendation(&mut self, recommendation: Recommendation) {
        self.recommendations.push(recommendation);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.opportunities.is_empty() && self.recommendations.is_empty()
    }
}

/// Rounds a money amount to 2 decimal places with banker's rounding.
///
/// The single rounding policy for the engine: risk thresholds and
/// opportunity metrics must agree on the cents.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Serializes JSON with object keys in sorted order at every level, so the
/// same logical params always produce the same bytes.
#[must_use]
pub fn canonical_json(value: &JsonValue) -> String {
    fn write(value: &JsonValue, out: &mut String) {
        match value {
            JsonValue::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key).unwrap_or_default());
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            JsonValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }

    let mut out = String::new();
    write(value, &mut out);
    out
}
