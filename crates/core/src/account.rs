//! Account-level broker state consumed by the engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Compliance regime of the broker account backing a strategy instance.
///
/// Selected per instance, never inferred: the risk engine applies
/// quantitative thresholds in `Margin` mode and hard categorical
/// prohibitions in `NoMargin` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskMode {
    /// Margin-eligible account: leveraged/naked exposure allowed within limits.
    Margin,
    /// Margin-prohibited account (TFSA-equivalent): no naked or leveraged exposure.
    NoMargin,
}

impl RiskMode {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Margin => "margin",
            Self::NoMargin => "no_margin",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "margin" => Some(Self::Margin),
            "no_margin" | "cash" => Some(Self::NoMargin),
            _ => None,
        }
    }
}

/// A normalized account snapshot produced by the ingestion collaborator.
///
/// Read-only to the engine. A context is always anchored to exactly one
/// snapshot; the engine never synthesizes a zero-state snapshot when none
/// exists for the requested as-of time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub cash: Decimal,
    pub buying_power: Decimal,
    pub maintenance_margin: Decimal,
    pub used_margin: Decimal,
    pub asof_ts: DateTime<Utc>,
}

impl AccountSnapshot {
    /// Fraction of total margin capacity currently consumed, in [0, 1].
    ///
    /// Capacity is taken as `used_margin + buying_power`; returns `None`
    /// when the account reports no capacity at all.
    #[must_use]
    pub fn margin_utilization(&self) -> Option<Decimal> {
        let capacity = self.used_margin + self.buying_power;
        if capacity <= Decimal::ZERO {
            return None;
        }
        Some(self.used_margin / capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn snapshot(used: Decimal, bp: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            cash: dec!(50000),
            buying_power: bp,
            maintenance_margin: dec!(10000),
            used_margin: used,
            asof_ts: Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap(),
        }
    }

    #[test]
    fn risk_mode_round_trips() {
        assert_eq!(RiskMode::parse("margin"), Some(RiskMode::Margin));
        assert_eq!(RiskMode::parse("no_margin"), Some(RiskMode::NoMargin));
        assert_eq!(RiskMode::parse("cash"), Some(RiskMode::NoMargin));
        assert_eq!(RiskMode::parse("naked"), None);
        assert_eq!(RiskMode::Margin.as_str(), "margin");
        assert_eq!(RiskMode::NoMargin.as_str(), "no_margin");
    }

    #[test]
    fn margin_utilization_is_used_over_capacity() {
        let snap = snapshot(dec!(25000), dec!(75000));
        assert_eq!(snap.margin_utilization(), Some(dec!(0.25)));
    }

    #[test]
    fn margin_utilization_none_without_capacity() {
        let snap = snapshot(dec!(0), dec!(0));
        assert_eq!(snap.margin_utilization(), None);
    }
}
