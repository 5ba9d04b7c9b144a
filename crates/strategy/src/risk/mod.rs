//! Post-evaluation risk filtering.
//!
//! Strategies propose; the risk engine disposes. Filtering happens after
//! evaluation and before persistence, against the same context snapshot the
//! strategy saw. The rule set depends only on the instance's risk mode:
//! quantitative thresholds for margin accounts, hard categorical
//! prohibitions for no-margin accounts. Rejected recommendations are data,
//! not errors: they persist alongside approvals with the rejecting reason.

mod margin;
mod no_margin;

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::debug;

use wheelhouse_core::{ActionKind, Recommendation, RiskMode, StrategyContext};

/// Why a recommendation was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    InsufficientBuyingPower { required: Decimal, available: Decimal },
    MarginUtilizationCeiling { projected: Decimal, ceiling: Decimal },
    TickerConcentrationCeiling { projected: Decimal, ceiling: Decimal },
    NakedExposureProhibited { detail: String },
    MarginPurchaseProhibited { required: Decimal, cash: Decimal },
}

impl RejectReason {
    /// Stable machine-readable code persisted with the rejection.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientBuyingPower { .. } => "insufficient_buying_power",
            Self::MarginUtilizationCeiling { .. } => "margin_utilization_ceiling",
            Self::TickerConcentrationCeiling { .. } => "ticker_concentration_ceiling",
            Self::NakedExposureProhibited { .. } => "naked_exposure_prohibited",
            Self::MarginPurchaseProhibited { .. } => "margin_purchase_prohibited",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientBuyingPower { required, available } => {
                write!(f, "requires {required} buying power, {available} available")
            }
            Self::MarginUtilizationCeiling { projected, ceiling } => {
                write!(f, "projected utilization {projected} exceeds ceiling {ceiling}")
            }
            Self::TickerConcentrationCeiling { projected, ceiling } => {
                write!(f, "projected concentration {projected} exceeds ceiling {ceiling}")
            }
            Self::NakedExposureProhibited { detail } => {
                write!(f, "naked exposure prohibited in no-margin account: {detail}")
            }
            Self::MarginPurchaseProhibited { required, cash } => {
                write!(f, "debit {required} exceeds cash {cash} in no-margin account")
            }
        }
    }
}

/// One rejected recommendation with its reason, preserved for persistence.
#[derive(Debug)]
pub struct Rejection {
    pub recommendation: Recommendation,
    pub reason: RejectReason,
}

/// Split of one run's recommendations after filtering.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub approved: Vec<Recommendation>,
    pub rejected: Vec<Rejection>,
}

/// One risk rule. Returning `Some` rejects the recommendation.
trait RiskRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, rec: &Recommendation, ctx: &StrategyContext) -> Option<RejectReason>;
}

/// The mode-specific rule chain. Rules run in order; the first match
/// rejects and later rules are not consulted.
pub struct RiskEngine {
    rules: Vec<Box<dyn RiskRule>>,
}

impl RiskEngine {
    #[must_use]
    pub fn for_mode(mode: RiskMode) -> Self {
        let rules: Vec<Box<dyn RiskRule>> = match mode {
            RiskMode::Margin => vec![
                Box::new(margin::BuyingPowerRule),
                Box::new(margin::MarginUtilizationRule),
                Box::new(margin::ConcentrationRule),
            ],
            RiskMode::NoMargin => vec![
                Box::new(no_margin::ShortUncoveredRule),
                Box::new(no_margin::CashSecuredPutRule),
                Box::new(no_margin::LeveragedDebitRule),
            ],
        };
        Self { rules }
    }

    /// Filters evaluation output into approvals and rejections.
    #[must_use]
    pub fn filter(&self, recommendations: Vec<Recommendation>, ctx: &StrategyContext) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for rec in recommendations {
            match self.rules.iter().find_map(|rule| {
                rule.check(&rec, ctx).map(|reason| (rule.name(), reason))
            }) {
                Some((rule, reason)) => {
                    debug!(
                        rule,
                        code = reason.code(),
                        underlier = %rec.underlier,
                        action = rec.action.as_str(),
                        "recommendation rejected"
                    );
                    outcome.rejected.push(Rejection {
                        recommendation: rec,
                        reason,
                    });
                }
                None => outcome.approved.push(rec),
            }
        }
        outcome
    }
}

impl fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskEngine")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Reads a decimal out of recommendation params, accepting both JSON
/// numbers and the string form `Decimal` serializes to.
pub(crate) fn params_decimal(rec: &Recommendation, key: &str) -> Option<Decimal> {
    match rec.params.get(key)? {
        JsonValue::String(s) => Decimal::from_str(s).ok(),
        JsonValue::Number(n) => n.as_f64().and_then(Decimal::from_f64),
        _ => None,
    }
}

/// Contract quantity proposed by a recommendation, defaulting to one.
pub(crate) fn params_qty(rec: &Recommendation) -> Decimal {
    params_decimal(rec, "qty").unwrap_or(Decimal::ONE)
}

/// Margin the recommendation would consume if executed. Short puts are
/// approximated at 20% of notional; LEAPS purchases consume their debit;
/// covered writes, rolls of calls, and closes consume nothing new.
pub(crate) fn estimated_margin(rec: &Recommendation) -> Decimal {
    let qty = params_qty(rec);
    match rec.action {
        ActionKind::SellPut | ActionKind::RollPut => params_decimal(rec, "strike")
            .map_or(Decimal::ZERO, |strike| {
                strike * Decimal::ONE_HUNDRED * qty * Decimal::new(20, 2)
            }),
        ActionKind::BuyLeaps | ActionKind::RollLeaps => params_decimal(rec, "limit_price")
            .map_or(Decimal::ZERO, |price| price * Decimal::ONE_HUNDRED * qty),
        ActionKind::SellCall | ActionKind::RollCall | ActionKind::Close => Decimal::ZERO,
    }
}
