//! Option chain quotes supplied by the ingestion collaborator.
//!
//! Greeks arrive as data; the engine never computes them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::instrument::OptionContract;

/// One quoted contract in an option chain, with its delta as reported
/// by the data provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub contract: OptionContract,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Signed delta: negative for puts, positive for calls.
    pub delta: Decimal,
    pub open_interest: i64,
    pub asof_ts: DateTime<Utc>,
}

impl OptionQuote {
    /// Midpoint of bid/ask.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Bid/ask spread as a fraction of the midpoint, or `None` on a
    /// crossed/empty quote.
    #[must_use]
    pub fn spread_fraction(&self) -> Option<Decimal> {
        let mid = self.mid();
        if mid <= Decimal::ZERO || self.ask < self.bid {
            return None;
        }
        Some((self.ask - self.bid) / mid)
    }

    /// Unsigned delta, comparable against a configured target band.
    #[must_use]
    pub fn abs_delta(&self) -> Decimal {
        self.delta.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::OptionRight;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn quote(bid: Decimal, ask: Decimal) -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new(
                "AAPL",
                OptionRight::Put,
                dec!(180),
                NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            ),
            bid,
            ask,
            delta: dec!(-0.20),
            open_interest: 500,
            asof_ts: Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap(),
        }
    }

    #[test]
    fn mid_and_spread() {
        let q = quote(dec!(1.90), dec!(2.10));
        assert_eq!(q.mid(), dec!(2.00));
        assert_eq!(q.spread_fraction(), Some(dec!(0.1)));
    }

    #[test]
    fn crossed_quote_has_no_spread() {
        let q = quote(dec!(2.10), dec!(1.90));
        assert_eq!(q.spread_fraction(), None);
    }

    #[test]
    fn abs_delta_strips_sign() {
        assert_eq!(quote(dec!(1), dec!(1)).abs_delta(), dec!(0.20));
    }
}
