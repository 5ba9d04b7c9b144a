//! The immutable evaluation context.
//!
//! One `StrategyContext` is assembled per run from persisted broker state
//! and the merged instance configuration. It is read-only for the duration
//! of one evaluation and fully reproducible: identical (instance, asOf,
//! stored data) always yields an identical context.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::{AccountSnapshot, RiskMode};
use crate::chain::OptionQuote;
use crate::instrument::OptionRight;
use crate::position::{Execution, OpenOrder, Position};
use crate::schema::ConfigMap;

/// Snapshot of everything a strategy needs to decide what to do right now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyContext {
    pub instance_id: i64,
    pub client: String,
    pub portfolio: String,
    pub broker_account: String,
    pub risk_mode: RiskMode,

    pub asof_ts: DateTime<Utc>,

    /// The anchoring account snapshot.
    pub account: AccountSnapshot,

    // Already filtered for this portfolio/account.
    pub positions: Vec<Position>,
    pub open_orders: Vec<OpenOrder>,
    pub recent_executions: Vec<Execution>,

    /// Option chains keyed by underlier symbol.
    pub chains: HashMap<String, Vec<OptionQuote>>,
    /// Next known earnings date per underlier, where available.
    pub earnings: HashMap<String, NaiveDate>,

    /// Merged configuration: global defaults < schema defaults < overrides.
    pub config: ConfigMap,
}

impl StrategyContext {
    /// Creates an empty context for the given instance and as-of time.
    /// Engine and tests fill it in through the `with_*` builders.
    #[must_use]
    pub fn new(instance_id: i64, asof_ts: DateTime<Utc>) -> Self {
        Self {
            instance_id,
            client: String::new(),
            portfolio: String::new(),
            broker_account: String::new(),
            risk_mode: RiskMode::Margin,
            asof_ts,
            account: AccountSnapshot {
                cash: Decimal::ZERO,
                buying_power: Decimal::ZERO,
                maintenance_margin: Decimal::ZERO,
                used_margin: Decimal::ZERO,
                asof_ts,
            },
            positions: Vec::new(),
            open_orders: Vec::new(),
            recent_executions: Vec::new(),
            chains: HashMap::new(),
            earnings: HashMap::new(),
            config: ConfigMap::new(),
        }
    }

    #[must_use]
    pub fn with_owner(mut self, client: &str, portfolio: &str, broker_account: &str) -> Self {
        self.client = client.to_string();
        self.portfolio = portfolio.to_string();
        self.broker_account = broker_account.to_string();
        self
    }

    #[must_use]
    pub fn with_risk_mode(mut self, risk_mode: RiskMode) -> Self {
        self.risk_mode = risk_mode;
        self
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: AccountSnapshot) -> Self {
        self.account = snapshot;
        self
    }

    /// Shorthand for tests and call sites that have loose account fields;
    /// the snapshot is anchored at the context's as-of time.
    #[must_use]
    pub fn with_account(
        self,
        cash: Decimal,
        buying_power: Decimal,
        maintenance_margin: Decimal,
        used_margin: Decimal,
    ) -> Self {
        let asof_ts = self.asof_ts;
        self.with_snapshot(AccountSnapshot {
            cash,
            buying_power,
            maintenance_margin,
            used_margin,
            asof_ts,
        })
    }

    #[must_use]
    pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
        self.positions = positions;
        self
    }

    #[must_use]
    pub fn with_open_orders(mut self, open_orders: Vec<OpenOrder>) -> Self {
        self.open_orders = open_orders;
        self
    }

    #[must_use]
    pub fn with_executions(mut self, executions: Vec<Execution>) -> Self {
        self.recent_executions = executions;
        self
    }

    #[must_use]
    pub fn with_chain(mut self, underlier: &str, quotes: Vec<OptionQuote>) -> Self {
        self.chains.insert(underlier.to_string(), quotes);
        self
    }

    #[must_use]
    pub fn with_earnings(mut self, underlier: &str, date: NaiveDate) -> Self {
        self.earnings.insert(underlier.to_string(), date);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    // ------------------------------------------------------------------
    // Position/chain accessors
    // ------------------------------------------------------------------

    /// Quotes for one underlier; empty when no chain was supplied.
    #[must_use]
    pub fn chain(&self, underlier: &str) -> &[OptionQuote] {
        self.chains.get(underlier).map_or(&[], Vec::as_slice)
    }

    pub fn positions_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Position> {
        self.positions.iter().filter(move |p| p.symbol == symbol)
    }

    /// Net stock quantity held in `symbol`.
    #[must_use]
    pub fn stock_qty(&self, symbol: &str) -> Decimal {
        self.positions_for(symbol)
            .filter(|p| p.is_stock())
            .map(|p| p.qty)
            .sum()
    }

    /// True when a working sell order for the given right already exists,
    /// so an entry proposal would double up.
    #[must_use]
    pub fn has_pending_sell(&self, symbol: &str, right: OptionRight) -> bool {
        self.open_orders
            .iter()
            .any(|o| o.symbol == symbol && o.is_sell_of(right))
    }

    /// True when earnings for `symbol` fall within `days` calendar days
    /// after the as-of date.
    #[must_use]
    pub fn earnings_within(&self, symbol: &str, days: i64) -> bool {
        self.earnings.get(symbol).is_some_and(|date| {
            let delta = (*date - self.asof_ts.date_naive()).num_days();
            (0..=days).contains(&delta)
        })
    }

    // ------------------------------------------------------------------
    // Typed config accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn config_decimal(&self, name: &str) -> Option<Decimal> {
        self.config
            .get(name)
            .and_then(serde_json::Value::as_f64)
            .and_then(Decimal::from_f64)
    }

    #[must_use]
    pub fn config_integer(&self, name: &str) -> Option<i64> {
        self.config.get(name).and_then(serde_json::Value::as_i64)
    }

    #[must_use]
    pub fn config_bool(&self, name: &str) -> Option<bool> {
        self.config.get(name).and_then(serde_json::Value::as_bool)
    }

    /// Symbol list config field; empty when absent or malformed.
    #[must_use]
    pub fn config_symbols(&self, name: &str) -> Vec<String> {
        self.config
            .get(name)
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::OptionContract;
    use crate::position::{OrderSide, PositionKind};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn asof() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap()
    }

    fn stock(symbol: &str, qty: Decimal) -> Position {
        Position {
            symbol: symbol.to_string(),
            kind: PositionKind::Stock,
            qty,
            avg_cost: dec!(100),
            market_price: dec!(105),
            asof_ts: asof(),
        }
    }

    #[test]
    fn stock_qty_sums_only_stock_rows() {
        let ctx = StrategyContext::new(1, asof())
            .with_positions(vec![stock("XYZ", dec!(100)), stock("XYZ", dec!(50))]);
        assert_eq!(ctx.stock_qty("XYZ"), dec!(150));
        assert_eq!(ctx.stock_qty("AAPL"), dec!(0));
    }

    #[test]
    fn pending_sell_detection() {
        let contract = OptionContract::new(
            "AAPL",
            OptionRight::Put,
            dec!(180),
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
        );
        let ctx = StrategyContext::new(1, asof()).with_open_orders(vec![OpenOrder {
            symbol: "AAPL".to_string(),
            contract: Some(contract),
            side: OrderSide::Sell,
            qty: dec!(1),
        }]);
        assert!(ctx.has_pending_sell("AAPL", OptionRight::Put));
        assert!(!ctx.has_pending_sell("AAPL", OptionRight::Call));
        assert!(!ctx.has_pending_sell("MSFT", OptionRight::Put));
    }

    #[test]
    fn earnings_window_is_inclusive_forward_looking() {
        let ctx = StrategyContext::new(1, asof())
            .with_earnings("AAPL", NaiveDate::from_ymd_opt(2025, 6, 5).unwrap())
            .with_earnings("MSFT", NaiveDate::from_ymd_opt(2025, 5, 30).unwrap());
        assert!(ctx.earnings_within("AAPL", 7));
        assert!(!ctx.earnings_within("AAPL", 2));
        // Past earnings never block.
        assert!(!ctx.earnings_within("MSFT", 7));
        // Unknown symbol never blocks.
        assert!(!ctx.earnings_within("NVDA", 7));
    }

    #[test]
    fn typed_config_accessors() {
        let config = json!({
            "put_delta_target": 0.20,
            "put_days_out": 7,
            "enabled": true,
            "universe": ["AAPL", "MSFT"],
        });
        let ctx = StrategyContext::new(1, asof()).with_config(config.as_object().cloned().unwrap());

        assert_eq!(ctx.config_decimal("put_delta_target"), Some(dec!(0.2)));
        assert_eq!(ctx.config_integer("put_days_out"), Some(7));
        assert_eq!(ctx.config_bool("enabled"), Some(true));
        assert_eq!(ctx.config_symbols("universe"), vec!["AAPL", "MSFT"]);
        assert_eq!(ctx.config_decimal("missing"), None);
        assert!(ctx.config_symbols("missing").is_empty());
    }

    #[test]
    fn account_builder_anchors_the_snapshot() {
        let ctx = StrategyContext::new(1, asof()).with_account(
            dec!(1000),
            dec!(75000),
            dec!(0),
            dec!(25000),
        );
        assert_eq!(ctx.account.asof_ts, asof());
        assert_eq!(ctx.account.margin_utilization(), Some(dec!(0.25)));
    }

    #[test]
    fn chain_defaults_to_empty() {
        let ctx = StrategyContext::new(1, asof());
        assert!(ctx.chain("AAPL").is_empty());
    }
}
