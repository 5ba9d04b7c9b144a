//! Stateless wheel-phase classification.
//!
//! No "current phase" is ever stored: each evaluation re-derives the phase
//! of every underlier from the positions and working orders in the context.
//! A missed or duplicated trigger cannot corrupt an internal state machine
//! because there is none.

use rust_decimal::Decimal;

use wheelhouse_core::{OptionContract, OptionRight, Position, StrategyContext};

/// A short option position summarized for phase handling.
///
/// `avg_cost` is the premium received per share; `market_price` is the
/// current per-share cost to close.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortOption {
    pub contract: OptionContract,
    /// Number of contracts, as a positive count.
    pub contracts: Decimal,
    pub avg_cost: Decimal,
    pub market_price: Decimal,
}

impl ShortOption {
    fn from_position(pos: &Position) -> Option<Self> {
        let contract = pos.contract()?.clone();
        Some(Self {
            contract,
            contracts: pos.qty.abs(),
            avg_cost: pos.avg_cost,
            market_price: pos.market_price,
        })
    }

    /// Fraction of the received premium already captured, in [0, 1].
    /// `None` when the entry premium is unknown or non-positive.
    #[must_use]
    pub fn profit_fraction(&self) -> Option<Decimal> {
        if self.avg_cost <= Decimal::ZERO {
            return None;
        }
        let captured = (self.avg_cost - self.market_price) / self.avg_cost;
        Some(captured.clamp(Decimal::ZERO, Decimal::ONE))
    }
}

/// Where one underlier currently sits in the wheel cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum WheelPhase {
    /// Nothing held, nothing working: entry proposals are allowed.
    NoPosition,
    /// A sell-put order is already working; proposing another would double up.
    PutEntryPending,
    /// A short put is open: roll, close, or await expiry.
    ShortPutOpen(ShortOption),
    /// Assigned (or otherwise long) stock with no short call against it.
    AssignedStock { shares: Decimal },
    /// Long stock with a sell-call order already working.
    CallEntryPending { shares: Decimal },
    /// A covered call is open against held stock.
    CoveredCallOpen { shares: Decimal, call: ShortOption },
}

/// Classifies one underlier from positions and open orders.
///
/// Precedence: 100+ shares put the symbol on the covered-call side of the
/// wheel regardless of any residual short puts; otherwise an open (or
/// working) short put owns the symbol.
#[must_use]
pub fn classify(ctx: &StrategyContext, symbol: &str) -> WheelPhase {
    let shares = ctx.stock_qty(symbol);
    let short_put = ctx
        .positions_for(symbol)
        .find(|p| p.is_short_put())
        .and_then(ShortOption::from_position);
    let short_call = ctx
        .positions_for(symbol)
        .find(|p| p.is_short_call())
        .and_then(ShortOption::from_position);

    if shares >= Decimal::ONE_HUNDRED {
        if let Some(call) = short_call {
            return WheelPhase::CoveredCallOpen { shares, call };
        }
        if ctx.has_pending_sell(symbol, OptionRight::Call) {
            return WheelPhase::CallEntryPending { shares };
        }
        return WheelPhase::AssignedStock { shares };
    }

    if let Some(put) = short_put {
        return WheelPhase::ShortPutOpen(put);
    }
    if ctx.has_pending_sell(symbol, OptionRight::Put) {
        return WheelPhase::PutEntryPending;
    }

    WheelPhase::NoPosition
}
