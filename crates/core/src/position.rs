//! Positions, open orders, and executions as reported by the broker.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::instrument::{OptionContract, OptionRight};

/// What a position row actually holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionKind {
    Stock,
    Option(OptionContract),
}

/// One position row from the latest broker sync.
///
/// `symbol` is always the underlier, also for option positions. Quantities
/// are signed: negative means short. Option quantity is in contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub kind: PositionKind,
    pub qty: Decimal,
    pub avg_cost: Decimal,
    pub market_price: Decimal,
    pub asof_ts: DateTime<Utc>,
}

impl Position {
    #[must_use]
    pub fn is_stock(&self) -> bool {
        matches!(self.kind, PositionKind::Stock)
    }

    /// The option contract, when this row is an option position.
    #[must_use]
    pub fn contract(&self) -> Option<&OptionContract> {
        match &self.kind {
            PositionKind::Option(c) => Some(c),
            PositionKind::Stock => None,
        }
    }

    #[must_use]
    pub fn is_short_put(&self) -> bool {
        self.qty < Decimal::ZERO
            && self
                .contract()
                .is_some_and(|c| c.right == OptionRight::Put)
    }

    #[must_use]
    pub fn is_short_call(&self) -> bool {
        self.qty < Decimal::ZERO
            && self
                .contract()
                .is_some_and(|c| c.right == OptionRight::Call)
    }

    #[must_use]
    pub fn is_long_call(&self) -> bool {
        self.qty > Decimal::ZERO
            && self
                .contract()
                .is_some_and(|c| c.right == OptionRight::Call)
    }

    /// Long-dated long call usable as a stock surrogate (>= 365 DTE).
    #[must_use]
    pub fn is_leaps(&self, asof: DateTime<Utc>) -> bool {
        self.is_long_call()
            && self
                .contract()
                .is_some_and(|c| c.days_to_expiry(asof) >= 365)
    }
}

/// Side of a working order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// A working (not filled, not cancelled) broker order.
///
/// Phase classification treats a working order the same as the position it
/// would create, so a duplicated trigger cannot double-propose an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub symbol: String,
    pub contract: Option<OptionContract>,
    pub side: OrderSide,
    pub qty: Decimal,
}

impl OpenOrder {
    #[must_use]
    pub fn is_sell_of(&self, right: OptionRight) -> bool {
        self.side == OrderSide::Sell && self.contract.as_ref().is_some_and(|c| c.right == right)
    }
}

/// A fill from the recent execution window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub symbol: String,
    pub qty: Decimal,
    pub price: Decimal,
    pub fill_ts: DateTime<Utc>,
}
