//! Candidate contract selection.
//!
//! Every strategy variant funnels chain quotes through the same screen:
//! delta band, days-to-expiry window, and liquidity floors. The winner is
//! picked with a total ordering so identical inputs always select the same
//! contract.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use wheelhouse_core::{OptionQuote, OptionRight};

/// Screening thresholds, all sourced from merged instance config.
#[derive(Debug, Clone)]
pub struct ScreenParams {
    pub target_delta: Decimal,
    pub delta_band: Decimal,
    pub min_dte: i64,
    pub max_dte: i64,
    pub min_open_interest: i64,
    pub max_spread_fraction: Decimal,
}

/// Outcome of one screen pass, with rejection tallies for diagnostics.
#[derive(Debug)]
pub struct ScreenResult<'a> {
    pub best: Option<&'a OptionQuote>,
    pub considered: usize,
    pub rejected_delta: usize,
    pub rejected_dte: usize,
    pub rejected_liquidity: usize,
}

impl ScreenResult<'_> {
    /// Rejection counts as a diagnostics payload.
    #[must_use]
    pub fn tallies(&self) -> serde_json::Value {
        serde_json::json!({
            "considered": self.considered,
            "rejected_delta": self.rejected_delta,
            "rejected_dte": self.rejected_dte,
            "rejected_liquidity": self.rejected_liquidity,
        })
    }
}

/// Screens one chain for the best contract of the given right.
///
/// Survivors are ranked by distance from the target delta, then soonest
/// expiry, then lowest strike, then underlier. The ordering is total, so
/// the selection is deterministic for a given chain.
#[must_use]
pub fn screen<'a>(
    chain: &'a [OptionQuote],
    right: OptionRight,
    params: &ScreenParams,
    asof: DateTime<Utc>,
) -> ScreenResult<'a> {
    let mut result = ScreenResult {
        best: None,
        considered: 0,
        rejected_delta: 0,
        rejected_dte: 0,
        rejected_liquidity: 0,
    };

    let mut best_rank: Option<(Decimal, i64, Decimal, &str)> = None;
    for quote in chain.iter().filter(|q| q.contract.right == right) {
        result.considered += 1;

        let dte = quote.contract.days_to_expiry(asof);
        if !(params.min_dte..=params.max_dte).contains(&dte) {
            result.rejected_dte += 1;
            continue;
        }
        if (quote.abs_delta() - params.target_delta).abs() > params.delta_band {
            result.rejected_delta += 1;
            continue;
        }
        let spread_ok = quote
            .spread_fraction()
            .is_some_and(|s| s <= params.max_spread_fraction);
        if quote.open_interest < params.min_open_interest || !spread_ok {
            result.rejected_liquidity += 1;
            continue;
        }

        let rank = (
            (quote.abs_delta() - params.target_delta).abs(),
            dte,
            quote.contract.strike,
            quote.contract.underlier.as_str(),
        );
        if best_rank.as_ref().map_or(true, |current| rank < *current) {
            best_rank = Some(rank);
            result.best = Some(quote);
        }
    }

    result
}
