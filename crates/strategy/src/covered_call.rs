//! Standalone covered-call writing against stock held elsewhere.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use wheelhouse_core::{
    signal_types, ActionKind, Actions, OptionRight, Recommendation, Signal, Strategy,
    StrategyContext, StrategyId,
};

use crate::phase::{classify, ShortOption, WheelPhase};
use crate::select::{screen, ScreenParams};
use crate::wheel::{close_params, roll_params, sell_params};

/// `covered_call@v1`.
///
/// Writes calls against round lots the portfolio already holds; it never
/// proposes stock or put trades. Symbols without at least one round lot
/// screen out.
#[derive(Debug, Default)]
pub struct CoveredCallStrategy;

impl Strategy for CoveredCallStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::new("covered_call", "v1")
    }

    fn evaluate(&self, ctx: &StrategyContext) -> Result<Actions> {
        let mut actions = Actions::new();

        let profit_capture = ctx
            .config_decimal("profit_capture_fraction")
            .unwrap_or(dec!(0.70));
        let roll_dte_threshold = ctx.config_integer("roll_dte_threshold").unwrap_or(5);
        let earnings_buffer = ctx.config_integer("earnings_buffer_days").unwrap_or(7);
        let params = call_screen_params(ctx);

        for symbol in ctx.config_symbols("universe") {
            match classify(ctx, &symbol) {
                WheelPhase::AssignedStock { shares } => {
                    self.propose_entry(ctx, &params, earnings_buffer, &symbol, shares, &mut actions);
                }
                WheelPhase::CoveredCallOpen { call, .. } => {
                    self.manage_call(
                        ctx,
                        &params,
                        profit_capture,
                        roll_dte_threshold,
                        &symbol,
                        &call,
                        &mut actions,
                    );
                }
                WheelPhase::CallEntryPending { .. } => {
                    actions.push_signal(Signal::new(
                        signal_types::DIAGNOSTIC,
                        Some(&symbol),
                        json!({"state": "order_pending"}),
                    ));
                }
                // No round lot to cover: this strategy has nothing to do.
                WheelPhase::NoPosition
                | WheelPhase::PutEntryPending
                | WheelPhase::ShortPutOpen(_) => {
                    actions.push_signal(Signal::new(
                        signal_types::SCREEN_OUT,
                        Some(&symbol),
                        json!({
                            "reason": "insufficient_shares",
                            "shares": ctx.stock_qty(&symbol),
                        }),
                    ));
                }
            }
        }

        Ok(actions)
    }
}

impl CoveredCallStrategy {
    fn propose_entry(
        &self,
        ctx: &StrategyContext,
        params: &ScreenParams,
        earnings_buffer: i64,
        symbol: &str,
        shares: Decimal,
        actions: &mut Actions,
    ) {
        if ctx.earnings_within(symbol, earnings_buffer) {
            actions.push_signal(Signal::new(
                signal_types::SCREEN_OUT,
                Some(symbol),
                json!({"reason": "earnings_window", "buffer_days": earnings_buffer}),
            ));
            return;
        }

        let result = screen(ctx.chain(symbol), OptionRight::Call, params, ctx.asof_ts);
        let Some(quote) = result.best else {
            actions.push_signal(Signal::new(
                signal_types::SCREEN_OUT,
                Some(symbol),
                json!({"reason": "no_candidate", "detail": result.tallies()}),
            ));
            return;
        };

        let lots = (shares / Decimal::ONE_HUNDRED).floor();
        actions.push_recommendation(Recommendation {
            action: ActionKind::SellCall,
            underlier: symbol.to_string(),
            params: sell_params(quote, lots),
            confidence: dec!(60),
            rationale: format!("write {lots} call(s) against {shares} shares"),
        });
    }

    fn manage_call(
        &self,
        ctx: &StrategyContext,
        params: &ScreenParams,
        profit_capture: Decimal,
        roll_dte_threshold: i64,
        symbol: &str,
        call: &ShortOption,
        actions: &mut Actions,
    ) {
        let dte = call.contract.days_to_expiry(ctx.asof_ts);
        let captured = call.profit_fraction();
        let capture_hit = captured.is_some_and(|f| f >= profit_capture);

        if !capture_hit && dte > roll_dte_threshold {
            actions.push_signal(Signal::new(
                signal_types::PROFIT_CAPTURE_STATUS,
                Some(symbol),
                json!({
                    "contract": call.contract.key(),
                    "captured_fraction": captured,
                    "dte": dte,
                }),
            ));
            return;
        }

        let replacement = screen(ctx.chain(symbol), OptionRight::Call, params, ctx.asof_ts)
            .best
            .filter(|q| q.contract != call.contract);

        match replacement {
            Some(quote) => actions.push_recommendation(Recommendation {
                action: ActionKind::RollCall,
                underlier: symbol.to_string(),
                params: roll_params(call, quote),
                confidence: dec!(55),
                rationale: format!("roll {} out", call.contract.key()),
            }),
            None => actions.push_recommendation(Recommendation {
                action: ActionKind::Close,
                underlier: symbol.to_string(),
                params: close_params(call),
                confidence: dec!(55),
                rationale: format!("close {}, no replacement candidate", call.contract.key()),
            }),
        }
    }
}

fn call_screen_params(ctx: &StrategyContext) -> ScreenParams {
    let days_out = ctx.config_integer("call_days_out").unwrap_or(30);
    let tolerance = ctx.config_integer("dte_tolerance_days").unwrap_or(5);
    ScreenParams {
        target_delta: ctx.config_decimal("call_delta_target").unwrap_or(dec!(0.25)),
        delta_band: ctx.config_decimal("delta_band").unwrap_or(dec!(0.05)),
        min_dte: (days_out - tolerance).max(1),
        max_dte: days_out + tolerance,
        min_open_interest: ctx.config_integer("min_open_interest").unwrap_or(100),
        max_spread_fraction: ctx
            .config_decimal("max_spread_fraction")
            .unwrap_or(dec!(0.10)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use wheelhouse_core::{ConfigMap, OptionContract, OptionQuote, Position, PositionKind};

    fn asof() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap()
    }

    fn config() -> ConfigMap {
        json!({"universe": ["MSFT"]}).as_object().cloned().unwrap()
    }

    fn stock(qty: Decimal) -> Position {
        Position {
            symbol: "MSFT".to_string(),
            kind: PositionKind::Stock,
            qty,
            avg_cost: dec!(420),
            market_price: dec!(430),
            asof_ts: asof(),
        }
    }

    fn call_quote(strike: Decimal, delta: Decimal) -> OptionQuote {
        OptionQuote {
            contract: OptionContract::new(
                "MSFT",
                OptionRight::Call,
                strike,
                NaiveDate::from_ymd_opt(2025, 7, 3).unwrap(),
            ),
            bid: dec!(3.90),
            ask: dec!(4.10),
            delta,
            open_interest: 600,
            asof_ts: asof(),
        }
    }

    fn short_call(avg_cost: Decimal, mark: Decimal) -> Position {
        Position {
            symbol: "MSFT".to_string(),
            kind: PositionKind::Option(OptionContract::new(
                "MSFT",
                OptionRight::Call,
                dec!(450),
                NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            )),
            qty: dec!(-1),
            avg_cost,
            market_price: mark,
            asof_ts: asof(),
        }
    }

    #[test]
    fn writes_calls_against_round_lots() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_positions(vec![stock(dec!(300))])
            .with_chain("MSFT", vec![call_quote(dec!(460), dec!(0.24))]);

        let actions = CoveredCallStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        let rec = &actions.recommendations[0];
        assert_eq!(rec.action, ActionKind::SellCall);
        assert_eq!(rec.params["qty"], json!(dec!(3)));
    }

    #[test]
    fn insufficient_shares_screen_out() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_positions(vec![stock(dec!(50))])
            .with_chain("MSFT", vec![call_quote(dec!(460), dec!(0.24))]);

        let actions = CoveredCallStrategy.evaluate(&ctx).unwrap();

        assert!(actions.recommendations.is_empty());
        assert_eq!(actions.signals[0].payload["reason"], "insufficient_shares");
    }

    #[test]
    fn captured_call_rolls_when_replacement_exists() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_positions(vec![stock(dec!(100)), short_call(dec!(4.00), dec!(1.00))])
            .with_chain("MSFT", vec![call_quote(dec!(460), dec!(0.24))]);

        let actions = CoveredCallStrategy.evaluate(&ctx).unwrap();

        assert_eq!(actions.recommendations.len(), 1);
        assert_eq!(actions.recommendations[0].action, ActionKind::RollCall);
    }

    #[test]
    fn healthy_call_reports_status() {
        let ctx = StrategyContext::new(1, asof())
            .with_config(config())
            .with_positions(vec![stock(dec!(100)), short_call(dec!(4.00), dec!(3.50))]);

        let actions = CoveredCallStrategy.evaluate(&ctx).unwrap();

        assert!(actions.recommendations.is_empty());
        assert_eq!(
            actions.signals[0].signal_type,
            signal_types::PROFIT_CAPTURE_STATUS
        );
    }
}
