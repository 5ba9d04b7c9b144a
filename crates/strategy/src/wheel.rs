//! The wheel: cash-secured puts rolled into covered calls on assignment.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::debug;

use wheelhouse_core::{
    round_money, signal_types, ActionKind, Actions, Opportunity, OptionQuote, OptionRight,
    Recommendation, Signal, Strategy, StrategyContext, StrategyId,
};

use crate::phase::{classify, ShortOption, WheelPhase};
use crate::select::{screen, ScreenParams};

/// `wheel@v1`.
///
/// Per universe symbol, the phase is re-derived from positions and working
/// orders each run, then exactly one branch fires: propose a put entry,
/// manage an open short put, write a call against assigned stock, or manage
/// an open covered call.
#[derive(Debug, Default)]
pub struct WheelStrategy;

impl Strategy for WheelStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::new("wheel", "v1")
    }

    fn evaluate(&self, ctx: &StrategyContext) -> Result<Actions> {
        let knobs = Knobs::from_context(ctx);
        let mut actions = Actions::new();

        let universe = ctx.config_symbols("universe");
        let mut open_or_proposed = universe
            .iter()
            .filter(|s| !matches!(classify(ctx, s), WheelPhase::NoPosition))
            .count() as i64;

        for symbol in &universe {
            let phase = classify(ctx, symbol);
            debug!(symbol, ?phase, "wheel phase");
            match phase {
                WheelPhase::NoPosition => {
                    if open_or_proposed >= knobs.max_positions {
                        actions.push_signal(screen_out(symbol, "position_limit", json!({})));
                        continue;
                    }
                    if self.propose_put_entry(ctx, &knobs, symbol, &mut actions) {
                        open_or_proposed += 1;
                    }
                }
                WheelPhase::ShortPutOpen(put) => {
                    self.manage_short_option(ctx, &knobs, symbol, &put, OptionRight::Put, &mut actions);
                }
                WheelPhase::AssignedStock { shares } => {
                    self.propose_call_entry(ctx, &knobs, symbol, shares, &mut actions);
                }
                WheelPhase::CoveredCallOpen { call, .. } => {
                    self.manage_short_option(ctx, &knobs, symbol, &call, OptionRight::Call, &mut actions);
                }
                WheelPhase::PutEntryPending | WheelPhase::CallEntryPending { .. } => {
                    actions.push_signal(Signal::new(
                        signal_types::DIAGNOSTIC,
                        Some(symbol),
                        json!({"state": "order_pending"}),
                    ));
                }
            }
        }

        Ok(actions)
    }
}

impl WheelStrategy {
    /// Put entry: earnings gate, then screen. Returns true when an entry
    /// recommendation was emitted.
    fn propose_put_entry(
        &self,
        ctx: &StrategyContext,
        knobs: &Knobs,
        symbol: &str,
        actions: &mut Actions,
    ) -> bool {
        if ctx.earnings_within(symbol, knobs.earnings_buffer_days) {
            actions.push_signal(screen_out(
                symbol,
                "earnings_window",
                json!({"buffer_days": knobs.earnings_buffer_days}),
            ));
            return false;
        }

        let params = knobs.put_screen();
        let result = screen(ctx.chain(symbol), OptionRight::Put, &params, ctx.asof_ts);
        let Some(quote) = result.best else {
            actions.push_signal(screen_out(symbol, "no_candidate", result.tallies()));
            return false;
        };

        let dte = quote.contract.days_to_expiry(ctx.asof_ts);
        let mid = round_money(quote.mid());
        let notional = quote.contract.strike * Decimal::ONE_HUNDRED;
        let ror = annualized_ror(mid, quote.contract.strike, dte);

        actions.push_signal(Signal::new(
            signal_types::CANDIDATE_ROR,
            Some(symbol),
            json!({
                "contract": quote.contract.key(),
                "delta": quote.delta,
                "dte": dte,
                "mid": mid,
                "annualized_ror": ror,
            }),
        ));
        actions.push_opportunity(Opportunity {
            underlier: symbol.to_string(),
            contract: Some(quote.contract.clone()),
            metrics: json!({"delta": quote.delta, "dte": dte, "mid": mid, "annualized_ror": ror}),
            required_margin: Some(notional),
        });
        actions.push_recommendation(Recommendation {
            action: ActionKind::SellPut,
            underlier: symbol.to_string(),
            params: sell_params(quote, dec!(1)),
            confidence: dec!(60),
            rationale: format!(
                "sell {} at ~{} delta, {} DTE",
                quote.contract.key(),
                quote.abs_delta(),
                dte
            ),
        });
        true
    }

    /// Call entry against assigned stock: one contract per round lot.
    fn propose_call_entry(
        &self,
        ctx: &StrategyContext,
        knobs: &Knobs,
        symbol: &str,
        shares: Decimal,
        actions: &mut Actions,
    ) {
        let lots = (shares / Decimal::ONE_HUNDRED).floor();
        if lots < Decimal::ONE {
            return;
        }
        if ctx.earnings_within(symbol, knobs.earnings_buffer_days) {
            actions.push_signal(screen_out(
                symbol,
                "earnings_window",
                json!({"buffer_days": knobs.earnings_buffer_days}),
            ));
            return;
        }

        let params = knobs.call_screen();
        let result = screen(ctx.chain(symbol), OptionRight::Call, &params, ctx.asof_ts);
        let Some(quote) = result.best else {
            actions.push_signal(screen_out(symbol, "no_candidate", result.tallies()));
            return;
        };

        actions.push_recommendation(Recommendation {
            action: ActionKind::SellCall,
            underlier: symbol.to_string(),
            params: sell_params(quote, lots),
            confidence: dec!(60),
            rationale: format!("write {lots} covered call(s) against {shares} shares"),
        });
    }

    /// Open short option management, shared between the put and call sides:
    /// capture profit, roll when expiry is close, otherwise report status.
    fn manage_short_option(
        &self,
        ctx: &StrategyContext,
        knobs: &Knobs,
        symbol: &str,
        short: &ShortOption,
        right: OptionRight,
        actions: &mut Actions,
    ) {
        let dte = short.contract.days_to_expiry(ctx.asof_ts);
        let captured = short.profit_fraction();

        let capture_hit = captured.is_some_and(|f| f >= knobs.profit_capture_fraction);
        let expiry_close = dte <= knobs.roll_dte_threshold;
        if !capture_hit && !expiry_close {
            actions.push_signal(Signal::new(
                signal_types::PROFIT_CAPTURE_STATUS,
                Some(symbol),
                json!({
                    "contract": short.contract.key(),
                    "captured_fraction": captured,
                    "dte": dte,
                }),
            ));
            return;
        }

        let trigger = if capture_hit { "profit_capture" } else { "expiry_near" };
        let params = match right {
            OptionRight::Put => knobs.put_screen(),
            OptionRight::Call => knobs.call_screen(),
        };
        let replacement = screen(ctx.chain(symbol), right, &params, ctx.asof_ts)
            .best
            .filter(|q| q.contract != short.contract);

        match replacement {
            Some(quote) => {
                let action = match right {
                    OptionRight::Put => ActionKind::RollPut,
                    OptionRight::Call => ActionKind::RollCall,
                };
                actions.push_recommendation(Recommendation {
                    action,
                    underlier: symbol.to_string(),
                    params: roll_params(short, quote),
                    confidence: dec!(55),
                    rationale: format!("{trigger}: roll {} out", short.contract.key()),
                });
            }
            None => {
                actions.push_recommendation(Recommendation {
                    action: ActionKind::Close,
                    underlier: symbol.to_string(),
                    params: close_params(short),
                    confidence: dec!(55),
                    rationale: format!("{trigger}: no replacement candidate, close out"),
                });
            }
        }
    }
}

/// Tuning knobs pulled once from merged config. Fallbacks mirror the schema
/// defaults so a partially-merged config still evaluates sanely.
struct Knobs {
    put_delta_target: Decimal,
    put_days_out: i64,
    dte_tolerance_days: i64,
    call_delta_target: Decimal,
    call_days_out: i64,
    delta_band: Decimal,
    min_open_interest: i64,
    max_spread_fraction: Decimal,
    profit_capture_fraction: Decimal,
    roll_dte_threshold: i64,
    earnings_buffer_days: i64,
    max_positions: i64,
}

impl Knobs {
    fn from_context(ctx: &StrategyContext) -> Self {
        Self {
            put_delta_target: ctx.config_decimal("put_delta_target").unwrap_or(dec!(0.20)),
            put_days_out: ctx.config_integer("put_days_out").unwrap_or(7),
            dte_tolerance_days: ctx.config_integer("dte_tolerance_days").unwrap_or(3),
            call_delta_target: ctx.config_decimal("call_delta_target").unwrap_or(dec!(0.25)),
            call_days_out: ctx.config_integer("call_days_out").unwrap_or(30),
            delta_band: ctx.config_decimal("delta_band").unwrap_or(dec!(0.05)),
            min_open_interest: ctx.config_integer("min_open_interest").unwrap_or(100),
            max_spread_fraction: ctx
                .config_decimal("max_spread_fraction")
                .unwrap_or(dec!(0.10)),
            profit_capture_fraction: ctx
                .config_decimal("profit_capture_fraction")
                .unwrap_or(dec!(0.70)),
            roll_dte_threshold: ctx.config_integer("roll_dte_threshold").unwrap_or(3),
            earnings_buffer_days: ctx.config_integer("earnings_buffer_days").unwrap_or(7),
            max_positions: ctx.config_integer("max_positions").unwrap_or(5),
        }
    }

    fn put_screen(&self) -> ScreenParams {
        ScreenParams {
            target_delta: self.put_delta_target,
            delta_band: self.delta_band,
            min_dte: (self.put_days_out - self.dte_tolerance_days).max(1),
            max_dte: self.put_days_out + self.dte_tolerance_days,
            min_open_interest: self.min_open_interest,
            max_spread_fraction: self.max_spread_fraction,
        }
    }

    fn call_screen(&self) -> ScreenParams {
        ScreenParams {
            target_delta: self.call_delta_target,
            delta_band: self.delta_band,
            min_dte: (self.call_days_out - self.dte_tolerance_days).max(1),
            max_dte: self.call_days_out + self.dte_tolerance_days,
            min_open_interest: self.min_open_interest,
            max_spread_fraction: self.max_spread_fraction,
        }
    }
}

fn screen_out(symbol: &str, reason: &str, detail: serde_json::Value) -> Signal {
    Signal::new(
        signal_types::SCREEN_OUT,
        Some(symbol),
        json!({"reason": reason, "detail": detail}),
    )
}

pub(crate) fn sell_params(quote: &OptionQuote, qty: Decimal) -> serde_json::Value {
    json!({
        "contract": quote.contract.key(),
        "strike": quote.contract.strike,
        "expiry": quote.contract.expiry,
        "qty": qty,
        "limit_price": round_money(quote.mid()),
    })
}

pub(crate) fn roll_params(short: &ShortOption, quote: &OptionQuote) -> serde_json::Value {
    json!({
        "close_contract": short.contract.key(),
        "open_contract": quote.contract.key(),
        "strike": quote.contract.strike,
        "expiry": quote.contract.expiry,
        "qty": short.contracts,
        "limit_price": round_money(quote.mid()),
    })
}

pub(crate) fn close_params(short: &ShortOption) -> serde_json::Value {
    json!({
        "contract": short.contract.key(),
        "qty": short.contracts,
        "limit_price": round_money(short.market_price),
    })
}

/// Simple annualized return on risk: premium over strike, scaled to a year.
pub(crate) fn annualized_ror(premium: Decimal, strike: Decimal, dte: i64) -> Decimal {
    if strike <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let days = Decimal::from(dte.max(1));
    premium / strike * (Decimal::from(365) / days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use wheelhouse_core::{OptionContract, Position, PositionKind};

    fn asof() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap()
    }

    fn base_config() -> wheelhouse_core::ConfigMap {
        json!({
            "universe": ["AAPL"],
            "put_delta_target": 0.20,
            "put_days_out": 7,
            "dte_tolerance_days": 3,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn put_quote(strike: Decimal, day: u32, delta: Decimal) -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new(
                "AAPL",
                OptionRight::Put,
                strike,
                NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            ),
            bid: dec!(1.95),
            ask: dec!(2.05),
            delta,
            open_interest: 500,
            asof_ts: asof(),
        }
    }

    fn short_put_position(strike: Decimal, day: u32, avg_cost: Decimal, mark: Decimal) -> Position {
        Position {
            symbol: "AAPL".to_string(),
            kind: PositionKind::Option(OptionContract::new(
                "AAPL",
                OptionRight::Put,
                strike,
                NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            )),
            qty: dec!(-1),
            avg_cost,
            market_price: mark,
            asof_ts: asof(),
        }
    }

    #[test]
    fn flat_book_with_one_match_yields_one_entry() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_chain(
                "AAPL",
                vec![
                    put_quote(dec!(175), 6, dec!(-0.14)),
                    put_quote(dec!(180), 6, dec!(-0.21)),
                ],
            );

        let actions = WheelStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        let rec = &actions.recommendations[0];
        assert_eq!(rec.action, ActionKind::SellPut);
        assert_eq!(rec.params["strike"], json!(dec!(180)));
        assert_eq!(actions.opportunities.len(), 1);
        assert_eq!(
            actions.opportunities[0].required_margin,
            Some(dec!(18000))
        );
    }

    #[test]
    fn no_candidates_yields_screen_out_only() {
        // Delta far outside the band everywhere.
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_chain("AAPL", vec![put_quote(dec!(190), 6, dec!(-0.48))]);

        let actions = WheelStrategy.evaluate(&ctx).unwrap();

        assert!(actions.recommendations.is_empty());
        assert!(actions.opportunities.is_empty());
        let signal = &actions.signals[0];
        assert_eq!(signal.signal_type, signal_types::SCREEN_OUT);
        assert_eq!(signal.payload["reason"], "no_candidate");
        assert_eq!(signal.payload["detail"]["rejected_delta"], 1);
    }

    #[test]
    fn earnings_window_blocks_entry() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_chain("AAPL", vec![put_quote(dec!(180), 6, dec!(-0.21))])
            .with_earnings("AAPL", NaiveDate::from_ymd_opt(2025, 6, 5).unwrap());

        let actions = WheelStrategy.evaluate(&ctx).unwrap();

        assert!(actions.recommendations.is_empty());
        assert_eq!(actions.signals[0].payload["reason"], "earnings_window");
    }

    #[test]
    fn profit_capture_triggers_roll() {
        // 75% captured with a replacement candidate in the window.
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_positions(vec![short_put_position(dec!(180), 20, dec!(2.00), dec!(0.50))])
            .with_chain("AAPL", vec![put_quote(dec!(175), 6, dec!(-0.20))]);

        let actions = WheelStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        let rec = &actions.recommendations[0];
        assert_eq!(rec.action, ActionKind::RollPut);
        assert_eq!(rec.params["close_contract"], json!("AAPL 2025-06-20 P 180"));
        assert_eq!(rec.params["open_contract"], json!("AAPL 2025-06-06 P 175"));
    }

    #[test]
    fn profit_capture_without_replacement_closes() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_positions(vec![short_put_position(dec!(180), 20, dec!(2.00), dec!(0.50))]);

        let actions = WheelStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        assert_eq!(actions.recommendations[0].action, ActionKind::Close);
    }

    #[test]
    fn healthy_short_put_reports_status_only() {
        // 25% captured, 18 DTE: nothing to do yet.
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_positions(vec![short_put_position(dec!(180), 20, dec!(2.00), dec!(1.50))]);

        let actions = WheelStrategy.evaluate(&ctx).unwrap();

        assert!(actions.recommendations.is_empty());
        assert_eq!(
            actions.signals[0].signal_type,
            signal_types::PROFIT_CAPTURE_STATUS
        );
    }

    #[test]
    fn assigned_stock_writes_covered_calls_per_lot() {
        let stock = Position {
            symbol: "AAPL".to_string(),
            kind: PositionKind::Stock,
            qty: dec!(200),
            avg_cost: dec!(180),
            market_price: dec!(178),
            asof_ts: asof(),
        };
        let call = OptionQuote {
            contract: OptionContract::new(
                "AAPL",
                OptionRight::Call,
                dec!(195),
                NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
            ),
            bid: dec!(2.40),
            ask: dec!(2.60),
            delta: dec!(0.24),
            open_interest: 800,
            asof_ts: asof(),
        };
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_positions(vec![stock])
            .with_chain("AAPL", vec![call]);

        let actions = WheelStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        let rec = &actions.recommendations[0];
        assert_eq!(rec.action, ActionKind::SellCall);
        assert_eq!(rec.params["qty"], json!(dec!(2)));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(base_config())
            .with_chain(
                "AAPL",
                vec![
                    put_quote(dec!(175), 6, dec!(-0.18)),
                    put_quote(dec!(180), 6, dec!(-0.21)),
                ],
            );

        let a = WheelStrategy.evaluate(&ctx).unwrap();
        let b = WheelStrategy.evaluate(&ctx).unwrap();
        let key = |acts: &Actions| {
            acts.recommendations[0].identity_key(ctx.instance_id, ctx.asof_ts)
        };
        assert_eq!(key(&a), key(&b));
    }
}
