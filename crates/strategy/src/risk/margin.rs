//! Quantitative threshold rules for margin-eligible accounts.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use wheelhouse_core::{ActionKind, Position, Recommendation, StrategyContext};

use super::{estimated_margin, params_decimal, params_qty, RejectReason, RiskRule};

/// The new position's margin must fit in available buying power.
pub(super) struct BuyingPowerRule;

impl RiskRule for BuyingPowerRule {
    fn name(&self) -> &'static str {
        "buying_power"
    }

    fn check(&self, rec: &Recommendation, ctx: &StrategyContext) -> Option<RejectReason> {
        let required = estimated_margin(rec);
        if required > Decimal::ZERO && required > ctx.account.buying_power {
            return Some(RejectReason::InsufficientBuyingPower {
                required,
                available: ctx.account.buying_power,
            });
        }
        None
    }
}

/// Projected account-wide margin utilization must stay under the ceiling.
pub(super) struct MarginUtilizationRule;

impl RiskRule for MarginUtilizationRule {
    fn name(&self) -> &'static str {
        "margin_utilization"
    }

    fn check(&self, rec: &Recommendation, ctx: &StrategyContext) -> Option<RejectReason> {
        let added = estimated_margin(rec);
        if added <= Decimal::ZERO {
            return None;
        }
        let ceiling = ctx
            .config_decimal("max_margin_utilization")
            .unwrap_or(dec!(0.8));
        let capacity = ctx.account.used_margin + ctx.account.buying_power;
        if capacity <= Decimal::ZERO {
            return Some(RejectReason::MarginUtilizationCeiling {
                projected: Decimal::ONE,
                ceiling,
            });
        }
        let projected = (ctx.account.used_margin + added) / capacity;
        if projected > ceiling {
            return Some(RejectReason::MarginUtilizationCeiling { projected, ceiling });
        }
        None
    }
}

/// Exposure to any single underlier must stay under a fraction of equity.
pub(super) struct ConcentrationRule;

impl RiskRule for ConcentrationRule {
    fn name(&self) -> &'static str {
        "concentration"
    }

    fn check(&self, rec: &Recommendation, ctx: &StrategyContext) -> Option<RejectReason> {
        let added = proposed_notional(rec);
        if added <= Decimal::ZERO {
            return None;
        }
        let ceiling = ctx
            .config_decimal("max_ticker_concentration")
            .unwrap_or(dec!(0.25));
        let equity = ctx.account.cash
            + ctx
                .positions
                .iter()
                .map(position_value)
                .sum::<Decimal>();
        if equity <= Decimal::ZERO {
            return Some(RejectReason::TickerConcentrationCeiling {
                projected: Decimal::ONE,
                ceiling,
            });
        }
        let existing: Decimal = ctx
            .positions_for(&rec.underlier)
            .map(|p| position_value(p).abs())
            .sum();
        let projected = (existing + added) / equity;
        if projected > ceiling {
            return Some(RejectReason::TickerConcentrationCeiling { projected, ceiling });
        }
        None
    }
}

/// Notional the trade would put at risk in one underlier.
fn proposed_notional(rec: &Recommendation) -> Decimal {
    let qty = params_qty(rec);
    match rec.action {
        ActionKind::SellPut | ActionKind::RollPut => params_decimal(rec, "strike")
            .map_or(Decimal::ZERO, |strike| strike * Decimal::ONE_HUNDRED * qty),
        ActionKind::BuyLeaps | ActionKind::RollLeaps => params_decimal(rec, "limit_price")
            .map_or(Decimal::ZERO, |price| price * Decimal::ONE_HUNDRED * qty),
        // Covered writes and closes add no new underlier exposure.
        ActionKind::SellCall | ActionKind::RollCall | ActionKind::Close => Decimal::ZERO,
    }
}

fn position_value(pos: &Position) -> Decimal {
    if pos.is_stock() {
        pos.qty * pos.market_price
    } else {
        pos.qty * pos.market_price * Decimal::ONE_HUNDRED
    }
}
