//! Poor-man's covered call: deep ITM LEAPS as the stock surrogate, with
//! short calls written against them.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use wheelhouse_core::{
    round_money, signal_types, ActionKind, Actions, Opportunity, OptionRight, Position,
    Recommendation, Signal, Strategy, StrategyContext, StrategyId,
};

use crate::phase::ShortOption;
use crate::select::{screen, ScreenParams};
use crate::wheel::{roll_params, sell_params};

/// `synthetic_leaps@v1`.
///
/// Three concerns per symbol, in priority order: hold a deep-ITM LEAPS call
/// as the stock surrogate (buying or rolling it as needed), then write
/// short-dated calls against it. Total synthetic share exposure is capped
/// by config.
#[derive(Debug, Default)]
pub struct SyntheticLeapsStrategy;

impl Strategy for SyntheticLeapsStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::new("synthetic_leaps", "v1")
    }

    fn evaluate(&self, ctx: &StrategyContext) -> Result<Actions> {
        let knobs = Knobs::from_context(ctx);
        let mut actions = Actions::new();

        for symbol in ctx.config_symbols("universe") {
            match longest_dated_long_call(ctx, &symbol) {
                None => self.propose_leaps_entry(ctx, &knobs, &symbol, &mut actions),
                Some(leaps) => {
                    let dte = leaps
                        .contract()
                        .map_or(0, |c| c.days_to_expiry(ctx.asof_ts));
                    if dte <= knobs.leaps_roll_dte_threshold {
                        self.propose_leaps_roll(ctx, &knobs, &symbol, leaps, &mut actions);
                    } else {
                        self.manage_call_side(ctx, &knobs, &symbol, &mut actions);
                    }
                }
            }
        }

        Ok(actions)
    }
}

impl SyntheticLeapsStrategy {
    fn propose_leaps_entry(
        &self,
        ctx: &StrategyContext,
        knobs: &Knobs,
        symbol: &str,
        actions: &mut Actions,
    ) {
        let exposure = synthetic_delta_shares(ctx, knobs);
        let added = knobs.leaps_delta_target * Decimal::ONE_HUNDRED;
        if exposure + added > knobs.max_synthetic_delta_shares {
            actions.push_signal(Signal::new(
                signal_types::RISK_LIMIT_HIT,
                Some(symbol),
                json!({
                    "limit": "max_synthetic_delta_shares",
                    "exposure_shares": exposure,
                    "ceiling": knobs.max_synthetic_delta_shares,
                }),
            ));
            return;
        }

        let result = screen(ctx.chain(symbol), OptionRight::Call, &knobs.leaps_screen(), ctx.asof_ts);
        let Some(quote) = result.best else {
            actions.push_signal(Signal::new(
                signal_types::SCREEN_OUT,
                Some(symbol),
                json!({"reason": "no_leaps_candidate", "detail": result.tallies()}),
            ));
            return;
        };

        let cost = round_money(quote.mid() * Decimal::ONE_HUNDRED);
        actions.push_opportunity(Opportunity {
            underlier: symbol.to_string(),
            contract: Some(quote.contract.clone()),
            metrics: json!({
                "delta": quote.delta,
                "dte": quote.contract.days_to_expiry(ctx.asof_ts),
                "debit": cost,
            }),
            required_margin: Some(cost),
        });
        actions.push_recommendation(Recommendation {
            action: ActionKind::BuyLeaps,
            underlier: symbol.to_string(),
            params: json!({
                "contract": quote.contract.key(),
                "strike": quote.contract.strike,
                "expiry": quote.contract.expiry,
                "qty": dec!(1),
                "limit_price": round_money(quote.mid()),
            }),
            confidence: dec!(55),
            rationale: format!("establish stock surrogate {}", quote.contract.key()),
        });
    }

    fn propose_leaps_roll(
        &self,
        ctx: &StrategyContext,
        knobs: &Knobs,
        symbol: &str,
        leaps: &Position,
        actions: &mut Actions,
    ) {
        let Some(held) = leaps.contract() else { return };
        let replacement = screen(ctx.chain(symbol), OptionRight::Call, &knobs.leaps_screen(), ctx.asof_ts)
            .best
            .filter(|q| q.contract != *held);

        match replacement {
            Some(quote) => {
                let held_short = ShortOption {
                    contract: held.clone(),
                    contracts: leaps.qty.abs(),
                    avg_cost: leaps.avg_cost,
                    market_price: leaps.market_price,
                };
                actions.push_recommendation(Recommendation {
                    action: ActionKind::RollLeaps,
                    underlier: symbol.to_string(),
                    params: roll_params(&held_short, quote),
                    confidence: dec!(55),
                    rationale: format!("surrogate {} nearing expiry, roll out", held.key()),
                });
            }
            None => actions.push_signal(Signal::new(
                signal_types::DIAGNOSTIC,
                Some(symbol),
                json!({"state": "leaps_roll_blocked", "contract": held.key()}),
            )),
        }
    }

    /// With a healthy surrogate in place, write the short call leg.
    fn manage_call_side(
        &self,
        ctx: &StrategyContext,
        knobs: &Knobs,
        symbol: &str,
        actions: &mut Actions,
    ) {
        if let Some(short_call) = ctx.positions_for(symbol).find(|p| p.is_short_call()) {
            let captured = short_call_profit_fraction(short_call);
            actions.push_signal(Signal::new(
                signal_types::PROFIT_CAPTURE_STATUS,
                Some(symbol),
                json!({
                    "contract": short_call.contract().map(|c| c.key()),
                    "captured_fraction": captured,
                }),
            ));
            return;
        }
        if ctx.has_pending_sell(symbol, OptionRight::Call) {
            actions.push_signal(Signal::new(
                signal_types::DIAGNOSTIC,
                Some(symbol),
                json!({"state": "order_pending"}),
            ));
            return;
        }

        let result = screen(ctx.chain(symbol), OptionRight::Call, &knobs.short_call_screen(), ctx.asof_ts);
        let Some(quote) = result.best else {
            actions.push_signal(Signal::new(
                signal_types::SCREEN_OUT,
                Some(symbol),
                json!({"reason": "no_candidate", "detail": result.tallies()}),
            ));
            return;
        };

        actions.push_recommendation(Recommendation {
            action: ActionKind::SellCall,
            underlier: symbol.to_string(),
            params: sell_params(quote, dec!(1)),
            confidence: dec!(55),
            rationale: format!("write {} against LEAPS surrogate", quote.contract.key()),
        });
    }
}

struct Knobs {
    leaps_min_dte: i64,
    leaps_delta_target: Decimal,
    leaps_roll_dte_threshold: i64,
    delta_band: Decimal,
    call_delta_target: Decimal,
    call_days_out: i64,
    max_synthetic_delta_shares: Decimal,
    min_open_interest: i64,
    max_spread_fraction: Decimal,
}

impl Knobs {
    fn from_context(ctx: &StrategyContext) -> Self {
        Self {
            leaps_min_dte: ctx.config_integer("leaps_min_dte").unwrap_or(365),
            leaps_delta_target: ctx.config_decimal("leaps_delta_target").unwrap_or(dec!(0.80)),
            leaps_roll_dte_threshold: ctx
                .config_integer("leaps_roll_dte_threshold")
                .unwrap_or(180),
            delta_band: ctx.config_decimal("delta_band").unwrap_or(dec!(0.10)),
            call_delta_target: ctx.config_decimal("call_delta_target").unwrap_or(dec!(0.25)),
            call_days_out: ctx.config_integer("call_days_out").unwrap_or(30),
            max_synthetic_delta_shares: ctx
                .config_integer("max_synthetic_delta_shares")
                .map_or(dec!(500), Decimal::from),
            min_open_interest: ctx.config_integer("min_open_interest").unwrap_or(100),
            max_spread_fraction: ctx
                .config_decimal("max_spread_fraction")
                .unwrap_or(dec!(0.10)),
        }
    }

    fn leaps_screen(&self) -> ScreenParams {
        ScreenParams {
            target_delta: self.leaps_delta_target,
            delta_band: self.delta_band,
            min_dte: self.leaps_min_dte,
            max_dte: self.leaps_min_dte + 730,
            min_open_interest: self.min_open_interest,
            max_spread_fraction: self.max_spread_fraction,
        }
    }

    fn short_call_screen(&self) -> ScreenParams {
        ScreenParams {
            target_delta: self.call_delta_target,
            delta_band: self.delta_band,
            min_dte: (self.call_days_out - 5).max(1),
            max_dte: self.call_days_out + 5,
            min_open_interest: self.min_open_interest,
            max_spread_fraction: self.max_spread_fraction,
        }
    }
}

/// Longest-dated long call held in `symbol`, the current stock surrogate.
fn longest_dated_long_call<'a>(ctx: &'a StrategyContext, symbol: &'a str) -> Option<&'a Position> {
    ctx.positions_for(symbol)
        .filter(|p| p.is_long_call())
        .max_by_key(|p| p.contract().map(|c| c.expiry))
}

/// Estimated synthetic share exposure across all held long calls, using the
/// configured target delta as the per-contract estimate.
fn synthetic_delta_shares(ctx: &StrategyContext, knobs: &Knobs) -> Decimal {
    let contracts: Decimal = ctx
        .positions
        .iter()
        .filter(|p| p.is_long_call())
        .map(|p| p.qty)
        .sum();
    contracts * knobs.leaps_delta_target * Decimal::ONE_HUNDRED
}

fn short_call_profit_fraction(pos: &Position) -> Option<Decimal> {
    if pos.avg_cost <= Decimal::ZERO {
        return None;
    }
    Some(((pos.avg_cost - pos.market_price) / pos.avg_cost).clamp(Decimal::ZERO, Decimal::ONE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use wheelhouse_core::{ConfigMap, OptionContract, OptionQuote, PositionKind};

    fn asof() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap()
    }

    fn config() -> ConfigMap {
        json!({"universe": ["AAPL"]}).as_object().cloned().unwrap()
    }

    fn leaps_quote(expiry: NaiveDate, delta: Decimal) -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new("AAPL", OptionRight::Call, dec!(120), expiry),
            bid: dec!(68.00),
            ask: dec!(70.00),
            delta,
            open_interest: 300,
            asof_ts: asof(),
        }
    }

    fn short_call_quote() -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new(
                "AAPL",
                OptionRight::Call,
                dec!(210),
                NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
            ),
            bid: dec!(2.40),
            ask: dec!(2.60),
            delta: dec!(0.24),
            open_interest: 900,
            asof_ts: asof(),
        }
    }

    fn long_call(expiry: NaiveDate, qty: Decimal) -> Position {
        Position {
            symbol: "AAPL".to_string(),
            kind: PositionKind::Option(OptionContract::new(
                "AAPL",
                OptionRight::Call,
                dec!(120),
                expiry,
            )),
            qty,
            avg_cost: dec!(65.00),
            market_price: dec!(69.00),
            asof_ts: asof(),
        }
    }

    #[test]
    fn no_surrogate_proposes_leaps_buy() {
        let expiry = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_chain("AAPL", vec![leaps_quote(expiry, dec!(0.82))]);

        let actions = SyntheticLeapsStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        assert_eq!(actions.recommendations[0].action, ActionKind::BuyLeaps);
        // One contract at the 69.00 mid.
        assert_eq!(actions.opportunities[0].required_margin, Some(dec!(6900.00)));
    }

    #[test]
    fn exposure_cap_blocks_further_leaps() {
        // Six contracts at 0.80 delta is 480 synthetic shares; adding 80
        // more breaches the 500-share default cap.
        let expiry = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
        let mut other = long_call(expiry, dec!(6));
        other.symbol = "MSFT".to_string();
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_positions(vec![other])
            .with_chain("AAPL", vec![leaps_quote(expiry, dec!(0.82))]);

        let actions = SyntheticLeapsStrategy.evaluate(&ctx).unwrap();

        assert!(actions.recommendations.is_empty());
        assert_eq!(actions.signals[0].signal_type, signal_types::RISK_LIMIT_HIT);
    }

    #[test]
    fn healthy_surrogate_writes_short_call() {
        let expiry = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_positions(vec![long_call(expiry, dec!(1))])
            .with_chain("AAPL", vec![short_call_quote()]);

        let actions = SyntheticLeapsStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        assert_eq!(actions.recommendations[0].action, ActionKind::SellCall);
    }

    #[test]
    fn decayed_surrogate_rolls_out() {
        // Held LEAPS down to ~108 DTE, below the 180-day roll threshold.
        let near = NaiveDate::from_ymd_opt(2025, 9, 18).unwrap();
        let far = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_positions(vec![long_call(near, dec!(1))])
            .with_chain("AAPL", vec![leaps_quote(far, dec!(0.82))]);

        let actions = SyntheticLeapsStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        let rec = &actions.recommendations[0];
        assert_eq!(rec.action, ActionKind::RollLeaps);
        assert_eq!(rec.params["open_contract"], json!("AAPL 2026-12-18 C 120"));
    }
}
