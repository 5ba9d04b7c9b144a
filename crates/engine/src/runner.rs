//! The run lifecycle, from trigger to terminal ledger state.
//!
//! Order of operations per trigger: validate config (fail fast, no ledger
//! row), claim the run fence, assemble the context, evaluate, risk-filter,
//! commit. Every fenced run ends in exactly one terminal state; faults
//! after the fence become failed ledger rows instead of propagating.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use tracing::{error, info, warn};

use wheelhouse_core::{
    merge_config, Actions, EngineError, EngineSettings, StrategyContext, Violation,
};
use wheelhouse_data::{
    PersistenceCoordinator, RecommendationDisposition, RecommendationStatus, Repositories,
    StrategyInstanceRecord,
};
use wheelhouse_strategy::{FilterOutcome, RegisteredStrategy, RiskEngine, StrategyRegistry};

use crate::context::ContextBuilder;

/// Terminal disposition of one trigger.
#[derive(Debug)]
pub enum RunOutcome {
    /// Another trigger already held the (instance, as-of) fence.
    Skipped,
    /// The run never started: validation or resolution failed before the
    /// fence, so no ledger row exists.
    NotStarted { reason: String },
    /// The run started and failed; a failed ledger row records the code.
    Failed { run_id: i64, code: String },
    Completed {
        run_id: i64,
        signals: usize,
        opportunities: usize,
        approved: usize,
        rejected: usize,
    },
}

#[derive(Debug)]
pub struct RunSummary {
    pub instance_id: i64,
    pub asof_ts: DateTime<Utc>,
    pub outcome: RunOutcome,
}

/// Validate-only result for one instance.
#[derive(Debug)]
pub struct ValidationReport {
    pub instance_id: i64,
    pub strategy_id: String,
    pub violations: Vec<Violation>,
}

/// Drives runs end to end against one database pool.
pub struct Runner {
    registry: StrategyRegistry,
    repos: Repositories,
    coordinator: PersistenceCoordinator,
    context: ContextBuilder,
    settings: EngineSettings,
}

impl Runner {
    #[must_use]
    pub fn new(pool: PgPool, registry: StrategyRegistry, settings: EngineSettings) -> Self {
        let repos = Repositories::new(pool.clone());
        let context = ContextBuilder::new(repos.broker.clone(), &settings);
        Self {
            registry,
            repos,
            coordinator: PersistenceCoordinator::new(pool),
            context,
            settings,
        }
    }

    #[must_use]
    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    #[must_use]
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Validates one instance's config overrides against its version schema.
    ///
    /// # Errors
    /// Returns an error for a missing instance or unregistered strategy.
    pub async fn validate_instance(&self, instance_id: i64) -> Result<Vec<Violation>> {
        let instance = self.load_instance(instance_id).await?;
        Ok(self
            .registry
            .validate(&instance.strategy_id(), &instance.config_map())?)
    }

    /// Runs one instance at one as-of time.
    ///
    /// # Errors
    /// Returns an error only for faults before the run fence (missing or
    /// disabled instance, unknown strategy, invalid config). Faults after
    /// the fence are recorded on the run and reported in the summary.
    pub async fn run_instance(&self, instance_id: i64, asof: DateTime<Utc>) -> Result<RunSummary> {
        let instance = self.load_instance(instance_id).await?;
        if !instance.enabled {
            bail!("instance {instance_id} is disabled");
        }

        let strategy_id = instance.strategy_id();
        let entry = self.registry.resolve(&strategy_id)?;

        // Validation blocks run creation entirely: no ledger row, the
        // violations surface to the caller.
        let violations = entry.schema.validate(&instance.config_map());
        if !violations.is_empty() {
            return Err(EngineError::ConfigValidation(violations).into());
        }

        let Some(run_id) = self
            .repos
            .runs
            .start(instance.id, &strategy_id.to_string(), asof)
            .await?
        else {
            info!(instance_id, %asof, "run already exists, skipping");
            return Ok(RunSummary {
                instance_id,
                asof_ts: asof,
                outcome: RunOutcome::Skipped,
            });
        };

        match self.execute(&instance, entry, asof).await {
            Ok((actions, outcome, elapsed_ms)) => {
                let stats = run_stats(&actions, &outcome, elapsed_ms);
                let dispositions = dispositions(&outcome);
                match self
                    .coordinator
                    .commit_success(run_id, instance.id, asof, &actions, &dispositions, stats)
                    .await
                {
                    Ok(()) => Ok(RunSummary {
                        instance_id,
                        asof_ts: asof,
                        outcome: RunOutcome::Completed {
                            run_id,
                            signals: actions.signals.len(),
                            opportunities: actions.opportunities.len(),
                            approved: outcome.approved.len(),
                            rejected: outcome.rejected.len(),
                        },
                    }),
                    // The transaction rolled back: nothing of the run's
                    // output landed, so the attempt is a failed run.
                    Err(err) => Ok(self
                        .record_failure(instance_id, run_id, asof, "data", &err)
                        .await),
                }
            }
            Err(err) => {
                let code = err
                    .downcast_ref::<EngineError>()
                    .map_or("data", EngineError::code);
                Ok(self.record_failure(instance_id, run_id, asof, code, &err).await)
            }
        }
    }

    /// Flips a fenced run to `failed`, best effort: when even the failure
    /// write errors, the summary still reports `Failed` so callers never
    /// mistake a fenced attempt for one that did not start.
    async fn record_failure(
        &self,
        instance_id: i64,
        run_id: i64,
        asof: DateTime<Utc>,
        code: &str,
        err: &anyhow::Error,
    ) -> RunSummary {
        error!(instance_id, run_id, code, "run failed: {err:#}");
        if let Err(write_err) = self.repos.runs.fail(run_id, code, &format!("{err:#}")).await {
            error!(instance_id, run_id, "failure not recorded on run: {write_err:#}");
        }
        RunSummary {
            instance_id,
            asof_ts: asof,
            outcome: RunOutcome::Failed {
                run_id,
                code: code.to_string(),
            },
        }
    }

    /// Runs every enabled instance at one as-of time, concurrently. Faults
    /// are isolated per instance: one bad config or account never stops the
    /// sweep. Summaries come back in instance-list order.
    ///
    /// # Errors
    /// Returns an error only if the instance list cannot be loaded.
    pub async fn run_all(&self, asof: DateTime<Utc>) -> Result<Vec<RunSummary>> {
        let instances = self.repos.instances.list_enabled().await?;
        let runs = instances.iter().map(|instance| async move {
            match self.run_instance(instance.id, asof).await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(instance_id = instance.id, "instance not started: {err:#}");
                    RunSummary {
                        instance_id: instance.id,
                        asof_ts: asof,
                        outcome: RunOutcome::NotStarted {
                            reason: format!("{err:#}"),
                        },
                    }
                }
            }
        });
        Ok(join_all(runs).await)
    }

    /// Validate-only sweep: checks every enabled instance's config against
    /// its version schema without evaluating or persisting anything. An
    /// unregistered strategy version is reported as a violation rather than
    /// aborting the sweep.
    ///
    /// # Errors
    /// Returns an error only if the instance list cannot be loaded.
    pub async fn validate_all(&self) -> Result<Vec<ValidationReport>> {
        let instances = self.repos.instances.list_enabled().await?;
        let mut reports = Vec::with_capacity(instances.len());
        for instance in instances {
            let strategy_id = instance.strategy_id();
            let violations = match self.registry.validate(&strategy_id, &instance.config_map()) {
                Ok(violations) => violations,
                Err(err) => vec![Violation::new("strategy", err.to_string())],
            };
            reports.push(ValidationReport {
                instance_id: instance.id,
                strategy_id: strategy_id.to_string(),
                violations,
            });
        }
        Ok(reports)
    }

    /// Context assembly, evaluation, and risk filtering for one fenced run.
    async fn execute(
        &self,
        instance: &StrategyInstanceRecord,
        entry: &RegisteredStrategy,
        asof: DateTime<Utc>,
    ) -> Result<(Actions, FilterOutcome, u128)> {
        let merged = merge_config(
            &self.settings.global_defaults,
            &entry.schema,
            &instance.config_map(),
        );
        let ctx = self.context.build(instance, merged, asof).await?;

        let started = Instant::now();
        let actions = evaluate_guarded(entry, &ctx)?;
        let elapsed = started.elapsed();
        if elapsed.as_secs() > self.settings.run_timeout_secs {
            return Err(EngineError::Timeout {
                budget_secs: self.settings.run_timeout_secs,
            }
            .into());
        }

        let engine = RiskEngine::for_mode(ctx.risk_mode);
        let mut actions = actions;
        let recommendations = std::mem::take(&mut actions.recommendations);
        let outcome = engine.filter(recommendations, &ctx);

        Ok((actions, outcome, elapsed.as_millis()))
    }

    async fn load_instance(&self, instance_id: i64) -> Result<StrategyInstanceRecord> {
        self.repos
            .instances
            .get(instance_id)
            .await?
            .ok_or_else(|| anyhow!("no strategy instance with id {instance_id}"))
    }
}

/// Runs evaluate with a panic shield: a panicking strategy becomes a failed
/// run, never a crashed process.
fn evaluate_guarded(entry: &RegisteredStrategy, ctx: &StrategyContext) -> Result<Actions> {
    match catch_unwind(AssertUnwindSafe(|| entry.strategy.evaluate(ctx))) {
        Ok(Ok(actions)) => Ok(actions),
        Ok(Err(err)) => Err(EngineError::Evaluation(format!("{err:#}")).into()),
        Err(_) => Err(EngineError::Evaluation("strategy panicked".to_string()).into()),
    }
}

fn dispositions(outcome: &FilterOutcome) -> Vec<RecommendationDisposition<'_>> {
    let approved = outcome.approved.iter().map(|rec| RecommendationDisposition {
        recommendation: rec,
        status: RecommendationStatus::Approved,
        reject_code: None,
        reject_message: None,
    });
    let rejected = outcome.rejected.iter().map(|r| RecommendationDisposition {
        recommendation: &r.recommendation,
        status: RecommendationStatus::Rejected,
        reject_code: Some(r.reason.code()),
        reject_message: Some(r.reason.to_string()),
    });
    approved.chain(rejected).collect()
}

fn run_stats(actions: &Actions, outcome: &FilterOutcome, elapsed_ms: u128) -> JsonValue {
    json!({
        "signals": actions.signals.len(),
        "opportunities": actions.opportunities.len(),
        "recommendations_approved": outcome.approved.len(),
        "recommendations_rejected": outcome.rejected.len(),
        "evaluate_ms": elapsed_ms as u64,
    })
}
