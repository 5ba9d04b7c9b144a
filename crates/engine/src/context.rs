//! Point-in-time context assembly.
//!
//! Builds one [`StrategyContext`] per run entirely from persisted state: no
//! broker calls, no clock reads beyond the caller-supplied as-of. Identical
//! (instance, as-of, stored data) always yields an identical context.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use wheelhouse_core::{
    AccountSnapshot, ConfigMap, EngineError, EngineSettings, StrategyContext,
};
use wheelhouse_data::{repositories::BrokerStateRepository, StrategyInstanceRecord};

/// Assembles evaluation contexts from persisted broker state.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    broker: BrokerStateRepository,
    execution_lookback_days: i64,
}

impl ContextBuilder {
    #[must_use]
    pub fn new(broker: BrokerStateRepository, settings: &EngineSettings) -> Self {
        Self {
            broker,
            execution_lookback_days: settings.execution_lookback_days,
        }
    }

    /// Builds the context for one run.
    ///
    /// The merged config (global defaults < schema defaults < instance
    /// overrides) is supplied by the caller, which has already validated
    /// the overrides.
    ///
    /// # Errors
    /// Returns [`EngineError::MissingSnapshot`] (wrapped) when no account
    /// snapshot exists at or before `asof`; a zero-state account is never
    /// synthesized. Other data faults surface as plain errors.
    pub async fn build(
        &self,
        instance: &StrategyInstanceRecord,
        merged_config: ConfigMap,
        asof: DateTime<Utc>,
    ) -> Result<StrategyContext> {
        let account = &instance.broker_account;

        let snapshot: AccountSnapshot = self
            .broker
            .latest_snapshot_at_or_before(account, asof)
            .await
            .context("loading account snapshot")?
            .ok_or(EngineError::MissingSnapshot { asof_ts: asof })?
            .into();

        let positions = self
            .broker
            .positions_at(account, asof)
            .await
            .context("loading positions")?
            .into_iter()
            .map(wheelhouse_data::PositionRecord::into_position)
            .collect::<Result<Vec<_>>>()?;

        let open_orders = self
            .broker
            .open_orders_at(account, asof)
            .await
            .context("loading open orders")?
            .into_iter()
            .map(wheelhouse_data::OpenOrderRecord::into_open_order)
            .collect::<Result<Vec<_>>>()?;

        let executions = self
            .broker
            .executions_within(account, asof, self.execution_lookback_days)
            .await
            .context("loading executions")?
            .into_iter()
            .map(Into::into)
            .collect();

        let mut ctx = StrategyContext::new(instance.id, asof)
            .with_owner(&instance.client, &instance.portfolio, account)
            .with_risk_mode(instance.risk_mode()?)
            .with_snapshot(snapshot)
            .with_positions(positions)
            .with_open_orders(open_orders)
            .with_executions(executions)
            .with_config(merged_config);

        // Chains and earnings only for the symbols the instance trades.
        let universe = ctx.config_symbols("universe");
        for symbol in &universe {
            let quotes = self
                .broker
                .chain_at(symbol, asof)
                .await
                .with_context(|| format!("loading chain for {symbol}"))?
                .into_iter()
                .map(wheelhouse_data::ChainQuoteRecord::into_quote)
                .collect::<Result<Vec<_>>>()?;
            ctx = ctx.with_chain(symbol, quotes);
        }
        for (symbol, date) in self
            .broker
            .earnings_for(&universe, asof)
            .await
            .context("loading earnings calendar")?
        {
            ctx = ctx.with_earnings(&symbol, date);
        }

        debug!(
            instance_id = instance.id,
            %asof,
            positions = ctx.positions.len(),
            chains = ctx.chains.len(),
            "context assembled"
        );
        Ok(ctx)
    }
}
