//! Categorical prohibitions for no-margin (TFSA-equivalent) accounts.
//!
//! These are hard constraints, never thresholds: an uncovered short, a put
//! that is not fully cash-secured, or a debit beyond settled cash is
//! rejected outright regardless of account size.

use rust_decimal::Decimal;

use wheelhouse_core::{ActionKind, Recommendation, StrategyContext};

use super::{params_decimal, params_qty, RejectReason, RiskRule};

/// Every short call must be covered by stock or a long-call surrogate.
pub(super) struct ShortUncoveredRule;

impl RiskRule for ShortUncoveredRule {
    fn name(&self) -> &'static str {
        "short_uncovered"
    }

    fn check(&self, rec: &Recommendation, ctx: &StrategyContext) -> Option<RejectReason> {
        if !matches!(rec.action, ActionKind::SellCall | ActionKind::RollCall) {
            return None;
        }
        let required_shares = params_qty(rec) * Decimal::ONE_HUNDRED;
        let covered = call_coverage_shares(ctx, &rec.underlier);
        // A roll frees the shares its closing leg consumed.
        let freed = if rec.action == ActionKind::RollCall {
            required_shares
        } else {
            Decimal::ZERO
        };
        if covered + freed < required_shares {
            return Some(RejectReason::NakedExposureProhibited {
                detail: format!(
                    "{} covered share(s) for a {} share call obligation in {}",
                    covered, required_shares, rec.underlier
                ),
            });
        }
        None
    }
}

/// Short puts must be secured by settled cash for the full assignment cost.
pub(super) struct CashSecuredPutRule;

impl RiskRule for CashSecuredPutRule {
    fn name(&self) -> &'static str {
        "cash_secured_put"
    }

    fn check(&self, rec: &Recommendation, ctx: &StrategyContext) -> Option<RejectReason> {
        if !matches!(rec.action, ActionKind::SellPut | ActionKind::RollPut) {
            return None;
        }
        // A strike that cannot be read cannot be cash-secured; hard
        // prohibitions fail closed.
        let Some(strike) = params_decimal(rec, "strike") else {
            return Some(RejectReason::NakedExposureProhibited {
                detail: format!("short put in {} with unreadable strike", rec.underlier),
            });
        };
        let required = strike * Decimal::ONE_HUNDRED * params_qty(rec);
        if required > ctx.account.cash {
            return Some(RejectReason::NakedExposureProhibited {
                detail: format!(
                    "short put needs {} cash secured, {} settled",
                    required, ctx.account.cash
                ),
            });
        }
        None
    }
}

/// Debits must clear against settled cash; there is nothing to borrow.
pub(super) struct LeveragedDebitRule;

impl RiskRule for LeveragedDebitRule {
    fn name(&self) -> &'static str {
        "leveraged_debit"
    }

    fn check(&self, rec: &Recommendation, ctx: &StrategyContext) -> Option<RejectReason> {
        if !matches!(rec.action, ActionKind::BuyLeaps | ActionKind::RollLeaps) {
            return None;
        }
        // An unreadable debit cannot be verified against settled cash;
        // hard prohibitions fail closed.
        let Some(price) = params_decimal(rec, "limit_price") else {
            return Some(RejectReason::NakedExposureProhibited {
                detail: format!("debit in {} with unreadable limit_price", rec.underlier),
            });
        };
        let required = price * Decimal::ONE_HUNDRED * params_qty(rec);
        if required > ctx.account.cash {
            return Some(RejectReason::MarginPurchaseProhibited {
                required,
                cash: ctx.account.cash,
            });
        }
        None
    }
}

/// Shares of call coverage available in one underlier: held stock plus 100
/// per long call, minus 100 per short call already written.
fn call_coverage_shares(ctx: &StrategyContext, symbol: &str) -> Decimal {
    let stock = ctx.stock_qty(symbol);
    let long_calls: Decimal = ctx
        .positions_for(symbol)
        .filter(|p| p.is_long_call())
        .map(|p| p.qty)
        .sum();
    let short_calls: Decimal = ctx
        .positions_for(symbol)
        .filter(|p| p.is_short_call())
        .map(|p| p.qty.abs())
        .sum();
    stock + (long_calls - short_calls) * Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::super::tests::{asof, recommendation};
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wheelhouse_core::{OptionContract, OptionRight, Position, PositionKind};

    fn stock(qty: Decimal) -> Position {
        Position {
            symbol: "AAPL".to_string(),
            kind: PositionKind::Stock,
            qty,
            avg_cost: dec!(180),
            market_price: dec!(185),
            asof_ts: asof(),
        }
    }

    fn call_position(qty: Decimal) -> Position {
        Position {
            symbol: "AAPL".to_string(),
            kind: PositionKind::Option(OptionContract::new(
                "AAPL",
                OptionRight::Call,
                dec!(150),
                NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
            )),
            qty,
            avg_cost: dec!(40),
            market_price: dec!(45),
            asof_ts: asof(),
        }
    }

    fn sell_call(qty: &str) -> Recommendation {
        recommendation(ActionKind::SellCall, json!({"strike": "200", "qty": qty}))
    }

    #[test]
    fn uncovered_call_is_rejected() {
        let ctx = StrategyContext::new(1, asof()).with_positions(vec![stock(dec!(60))]);
        let reason = ShortUncoveredRule.check(&sell_call("1"), &ctx).unwrap();
        assert_eq!(reason.code(), "naked_exposure_prohibited");
    }

    #[test]
    fn stock_covers_the_call() {
        let ctx = StrategyContext::new(1, asof()).with_positions(vec![stock(dec!(100))]);
        assert!(ShortUncoveredRule.check(&sell_call("1"), &ctx).is_none());
    }

    #[test]
    fn leaps_surrogate_counts_as_coverage() {
        let ctx = StrategyContext::new(1, asof()).with_positions(vec![call_position(dec!(1))]);
        assert!(ShortUncoveredRule.check(&sell_call("1"), &ctx).is_none());
    }

    #[test]
    fn existing_short_calls_consume_coverage() {
        let ctx = StrategyContext::new(1, asof())
            .with_positions(vec![stock(dec!(100)), call_position(dec!(-1))]);
        assert!(ShortUncoveredRule.check(&sell_call("1"), &ctx).is_some());
    }

    #[test]
    fn roll_reuses_the_coverage_it_frees() {
        // 100 shares fully consumed by the existing short call; rolling it
        // is still covered because the closing leg frees those shares.
        let ctx = StrategyContext::new(1, asof())
            .with_positions(vec![stock(dec!(100)), call_position(dec!(-1))]);
        let roll = recommendation(ActionKind::RollCall, json!({"strike": "210", "qty": "1"}));
        assert!(ShortUncoveredRule.check(&roll, &ctx).is_none());
    }

    #[test]
    fn put_must_be_fully_cash_secured() {
        let rec = recommendation(ActionKind::SellPut, json!({"strike": "180", "qty": "1"}));

        let rich = StrategyContext::new(1, asof()).with_account(
            dec!(20000),
            dec!(20000),
            dec!(0),
            dec!(0),
        );
        assert!(CashSecuredPutRule.check(&rec, &rich).is_none());

        let poor = StrategyContext::new(1, asof()).with_account(
            dec!(17999),
            dec!(17999),
            dec!(0),
            dec!(0),
        );
        let reason = CashSecuredPutRule.check(&rec, &poor).unwrap();
        assert_eq!(reason.code(), "naked_exposure_prohibited");
    }

    #[test]
    fn unreadable_params_fail_closed() {
        // Plenty of cash, but the sizing params cannot be read: the
        // prohibition rules reject rather than wave the trade through.
        let ctx = StrategyContext::new(1, asof()).with_account(
            dec!(1000000),
            dec!(1000000),
            dec!(0),
            dec!(0),
        );

        let put = recommendation(ActionKind::SellPut, json!({"qty": "1"}));
        let reason = CashSecuredPutRule.check(&put, &ctx).unwrap();
        assert_eq!(reason.code(), "naked_exposure_prohibited");
        assert!(reason.to_string().contains("unreadable strike"));

        let leaps = recommendation(ActionKind::BuyLeaps, json!({"qty": "1"}));
        let reason = LeveragedDebitRule.check(&leaps, &ctx).unwrap();
        assert_eq!(reason.code(), "naked_exposure_prohibited");
        assert!(reason.to_string().contains("unreadable limit_price"));
    }

    #[test]
    fn leaps_debit_beyond_cash_is_rejected() {
        let rec = recommendation(
            ActionKind::BuyLeaps,
            json!({"limit_price": "69.00", "qty": "1"}),
        );
        let ctx = StrategyContext::new(1, asof()).with_account(
            dec!(5000),
            dec!(5000),
            dec!(0),
            dec!(0),
        );
        let reason = LeveragedDebitRule.check(&rec, &ctx).unwrap();
        assert_eq!(reason.code(), "margin_purchase_prohibited");
    }
}
