//! Option contract identification.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Right of an option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    /// Returns the single-letter representation used in contract keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

/// A specific listed option contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying ticker symbol, e.g. "AAPL".
    pub underlier: String,
    pub right: OptionRight,
    pub strike: Decimal,
    pub expiry: NaiveDate,
}

impl OptionContract {
    #[must_use]
    pub fn new(underlier: &str, right: OptionRight, strike: Decimal, expiry: NaiveDate) -> Self {
        Self {
            underlier: underlier.to_string(),
            right,
            strike,
            expiry,
        }
    }

    /// Calendar days to expiry relative to `asof`. Negative once expired.
    #[must_use]
    pub fn days_to_expiry(&self, asof: DateTime<Utc>) -> i64 {
        (self.expiry - asof.date_naive()).num_days()
    }

    /// Stable textual key, e.g. `AAPL 2025-06-20 P 180`.
    ///
    /// Used inside recommendation params and identity keys; the strike is
    /// normalized so `180` and `180.00` produce the same key.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{} {} {} {}",
            self.underlier,
            self.expiry,
            self.right.as_str(),
            self.strike.normalize()
        )
    }
}
