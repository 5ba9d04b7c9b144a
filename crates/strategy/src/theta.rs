//! Theta farm: premium harvesting with short puts across a universe.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::debug;

use wheelhouse_core::{
    round_money, signal_types, ActionKind, Actions, Opportunity, OptionRight, Recommendation,
    Signal, Strategy, StrategyContext, StrategyId,
};

use crate::select::{screen, ScreenParams};
use crate::wheel::{annualized_ror, sell_params};

/// `theta_farm@v1`.
///
/// Sells further-dated, lower-delta puts than the wheel and never takes
/// assignment flow: the only goal is premium decay across many underliers.
/// Entries stop entirely once margin utilization crosses the configured
/// ceiling; the strategy holds what it has and reports the breach.
#[derive(Debug, Default)]
pub struct ThetaFarmStrategy;

impl Strategy for ThetaFarmStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::new("theta_farm", "v1")
    }

    fn evaluate(&self, ctx: &StrategyContext) -> Result<Actions> {
        let mut actions = Actions::new();

        let max_utilization = ctx
            .config_decimal("max_margin_utilization")
            .unwrap_or(dec!(0.5));
        let max_positions = ctx.config_integer("max_positions").unwrap_or(5);

        let mut open = ctx.positions.iter().filter(|p| p.is_short_put()).count() as i64;
        debug!(open, "theta farm open short puts");

        if let Some(utilization) = ctx.account.margin_utilization() {
            if utilization >= max_utilization {
                actions.push_signal(Signal::new(
                    signal_types::RISK_LIMIT_HIT,
                    None,
                    json!({
                        "limit": "max_margin_utilization",
                        "utilization": utilization,
                        "ceiling": max_utilization,
                    }),
                ));
                return Ok(actions);
            }
        }

        let params = ScreenParams {
            target_delta: ctx.config_decimal("target_delta").unwrap_or(dec!(0.16)),
            delta_band: ctx.config_decimal("delta_band").unwrap_or(dec!(0.05)),
            min_dte: ctx.config_integer("min_dte").unwrap_or(30),
            max_dte: ctx.config_integer("max_dte").unwrap_or(60),
            min_open_interest: ctx.config_integer("min_open_interest").unwrap_or(100),
            max_spread_fraction: ctx
                .config_decimal("max_spread_fraction")
                .unwrap_or(dec!(0.10)),
        };

        // Universe order is the tie-break across symbols, so runs are
        // reproducible whatever the chain map iteration order is.
        for symbol in ctx.config_symbols("universe") {
            if open >= max_positions {
                actions.push_signal(Signal::new(
                    signal_types::SCREEN_OUT,
                    Some(&symbol),
                    json!({"reason": "position_limit", "max_positions": max_positions}),
                ));
                continue;
            }
            if ctx.positions_for(&symbol).next().is_some()
                || ctx.has_pending_sell(&symbol, OptionRight::Put)
            {
                continue;
            }

            let result = screen(ctx.chain(&symbol), OptionRight::Put, &params, ctx.asof_ts);
            let Some(quote) = result.best else {
                actions.push_signal(Signal::new(
                    signal_types::SCREEN_OUT,
                    Some(&symbol),
                    json!({"reason": "no_candidate", "detail": result.tallies()}),
                ));
                continue;
            };

            let dte = quote.contract.days_to_expiry(ctx.asof_ts);
            let mid = round_money(quote.mid());
            // Naked short put margin approximated as 20% of notional.
            let required_margin =
                round_money(quote.contract.strike * Decimal::ONE_HUNDRED * dec!(0.20));

            actions.push_opportunity(Opportunity {
                underlier: symbol.clone(),
                contract: Some(quote.contract.clone()),
                metrics: json!({
                    "delta": quote.delta,
                    "dte": dte,
                    "mid": mid,
                    "annualized_ror": annualized_ror(mid, quote.contract.strike, dte),
                }),
                required_margin: Some(required_margin),
            });
            actions.push_recommendation(Recommendation {
                action: ActionKind::SellPut,
                underlier: symbol.clone(),
                params: sell_params(quote, dec!(1)),
                confidence: dec!(55),
                rationale: format!("harvest premium on {}", quote.contract.key()),
            });
            open += 1;
        }

        Ok(actions)
    }
}
