//! Broker-state rows written by the ingestion collaborator and read, never
//! written, by the engine.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wheelhouse_core::{
    AccountSnapshot, Execution, OpenOrder, OptionContract, OptionQuote, OptionRight, OrderSide,
    Position, PositionKind,
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountSnapshotRecord {
    pub broker_account: String,
    pub cash: Decimal,
    pub buying_power: Decimal,
    pub maintenance_margin: Decimal,
    pub used_margin: Decimal,
    pub asof_ts: DateTime<Utc>,
}

impl From<AccountSnapshotRecord> for AccountSnapshot {
    fn from(r: AccountSnapshotRecord) -> Self {
        Self {
            cash: r.cash,
            buying_power: r.buying_power,
            maintenance_margin: r.maintenance_margin,
            used_margin: r.used_margin,
            asof_ts: r.asof_ts,
        }
    }
}

/// A position row. Option legs carry right/strike/expiry; stock rows leave
/// them NULL.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PositionRecord {
    pub broker_account: String,
    pub symbol: String,
    pub sec_type: String,
    pub right: Option<String>,
    pub strike: Option<Decimal>,
    pub expiry: Option<NaiveDate>,
    pub qty: Decimal,
    pub avg_cost: Decimal,
    pub market_price: Decimal,
    pub asof_ts: DateTime<Utc>,
}

impl PositionRecord {
    /// # Errors
    /// Returns an error when the row is internally inconsistent, e.g. an
    /// option row missing its contract fields.
    pub fn into_position(self) -> Result<Position> {
        let kind = match self.sec_type.as_str() {
            "stock" => PositionKind::Stock,
            "option" => PositionKind::Option(option_contract(
                &self.symbol,
                self.right.as_deref(),
                self.strike,
                self.expiry,
            )?),
            other => bail!("position row for {} has unknown sec_type '{other}'", self.symbol),
        };
        Ok(Position {
            symbol: self.symbol,
            kind,
            qty: self.qty,
            avg_cost: self.avg_cost,
            market_price: self.market_price,
            asof_ts: self.asof_ts,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OpenOrderRecord {
    pub broker_account: String,
    pub symbol: String,
    pub sec_type: String,
    pub right: Option<String>,
    pub strike: Option<Decimal>,
    pub expiry: Option<NaiveDate>,
    pub side: String,
    pub qty: Decimal,
}

impl OpenOrderRecord {
    /// # Errors
    /// Returns an error on an unknown side or a malformed option row.
    pub fn into_open_order(self) -> Result<OpenOrder> {
        let side = OrderSide::parse(&self.side)
            .ok_or_else(|| anyhow!("order row for {} has unknown side '{}'", self.symbol, self.side))?;
        let contract = if self.sec_type == "option" {
            Some(option_contract(
                &self.symbol,
                self.right.as_deref(),
                self.strike,
                self.expiry,
            )?)
        } else {
            None
        };
        Ok(OpenOrder {
            symbol: self.symbol,
            contract,
            side,
            qty: self.qty,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExecutionRecord {
    pub broker_account: String,
    pub symbol: String,
    pub qty: Decimal,
    pub price: Decimal,
    pub fill_ts: DateTime<Utc>,
}

impl From<ExecutionRecord> for Execution {
    fn from(r: ExecutionRecord) -> Self {
        Self {
            symbol: r.symbol,
            qty: r.qty,
            price: r.price,
            fill_ts: r.fill_ts,
        }
    }
}

/// One chain quote row from the most recent chain pull for an underlier.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChainQuoteRecord {
    pub underlier: String,
    pub right: String,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub bid: Decimal,
    pub ask: Decimal,
    pub delta: Decimal,
    pub open_interest: i64,
    pub asof_ts: DateTime<Utc>,
}

impl ChainQuoteRecord {
    /// # Errors
    /// Returns an error on an unknown right.
    pub fn into_quote(self) -> Result<OptionQuote> {
        let right = OptionRight::parse(&self.right)
            .ok_or_else(|| anyhow!("chain row for {} has unknown right '{}'", self.underlier, self.right))?;
        Ok(OptionQuote {
            contract: OptionContract::new(&self.underlier, right, self.strike, self.expiry),
            bid: self.bid,
            ask: self.ask,
            delta: self.delta,
            open_interest: self.open_interest,
            asof_ts: self.asof_ts,
        })
    }
}

fn option_contract(
    symbol: &str,
    right: Option<&str>,
    strike: Option<Decimal>,
    expiry: Option<NaiveDate>,
) -> Result<OptionContract> {
    let right = right
        .and_then(OptionRight::parse)
        .ok_or_else(|| anyhow!("option row for {symbol} has missing or unknown right"))?;
    let strike = strike.ok_or_else(|| anyhow!("option row for {symbol} has no strike"))?;
    let expiry = expiry.ok_or_else(|| anyhow!("option row for {symbol} has no expiry"))?;
    Ok(OptionContract::new(symbol, right, strike, expiry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn asof() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap()
    }

    fn position_record(sec_type: &str) -> PositionRecord {
        PositionRecord {
            broker_account: "U1234567".to_string(),
            symbol: "AAPL".to_string(),
            sec_type: sec_type.to_string(),
            right: Some("P".to_string()),
            strike: Some(dec!(180)),
            expiry: NaiveDate::from_ymd_opt(2025, 6, 20),
            qty: dec!(-1),
            avg_cost: dec!(2.00),
            market_price: dec!(1.40),
            asof_ts: asof(),
        }
    }

    #[test]
    fn option_row_builds_contract() {
        let pos = position_record("option").into_position().unwrap();
        assert!(pos.is_short_put());
        assert_eq!(pos.contract().unwrap().key(), "AAPL 2025-06-20 P 180");
    }

    #[test]
    fn stock_row_ignores_contract_columns() {
        let pos = position_record("stock").into_position().unwrap();
        assert!(pos.is_stock());
    }

    #[test]
    fn unknown_sec_type_is_an_error() {
        assert!(position_record("future").into_position().is_err());
    }

    #[test]
    fn option_row_without_strike_is_an_error() {
        let mut record = position_record("option");
        record.strike = None;
        assert!(record.into_position().is_err());
    }

    #[test]
    fn chain_row_round_trips() {
        let record = ChainQuoteRecord {
            underlier: "AAPL".to_string(),
            right: "P".to_string(),
            strike: dec!(180),
            expiry: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            bid: dec!(1.90),
            ask: dec!(2.10),
            delta: dec!(-0.20),
            open_interest: 500,
            asof_ts: asof(),
        };
        let quote = record.into_quote().unwrap();
        assert_eq!(quote.mid(), dec!(2.00));
        assert_eq!(quote.contract.right, OptionRight::Put);
    }
}
