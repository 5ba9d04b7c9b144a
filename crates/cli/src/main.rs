use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use wheelhouse_core::{AppConfig, EngineError};
use wheelhouse_engine::{RunOutcome, Runner};
use wheelhouse_strategy::StrategyRegistry;

#[derive(Parser)]
#[command(name = "wheelhouse")]
#[command(about = "Options strategy engine over persisted broker state", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one strategy instance at an as-of time
    RunInstance {
        /// Strategy instance id
        #[arg(long)]
        instance: i64,
        /// As-of time in RFC 3339 (defaults to now)
        #[arg(long)]
        asof: Option<String>,
    },
    /// Evaluate every enabled instance at one as-of time
    RunAll {
        /// As-of time in RFC 3339 (defaults to now)
        #[arg(long)]
        asof: Option<String>,
    },
    /// Validate instance config against its strategy schema
    Validate {
        /// Strategy instance id; omit to validate every enabled instance
        #[arg(long)]
        instance: Option<i64>,
    },
    /// List the registered strategy versions
    ListStrategies,
    /// Show recent runs and their recommendations for an instance
    InspectRuns {
        /// Strategy instance id
        #[arg(long)]
        instance: i64,
        /// Number of runs to show
        #[arg(long, default_value = "10")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::ListStrategies = cli.command {
        // No database needed to list what the binary ships with.
        for id in StrategyRegistry::builtin().ids() {
            println!("{id}");
        }
        return Ok(());
    }

    let config = AppConfig::load(&cli.config)?;
    let pool = wheelhouse_data::connect(&config.database).await?;
    let runner = Runner::new(pool, StrategyRegistry::builtin(), config.engine);

    match cli.command {
        Commands::RunInstance { instance, asof } => {
            let asof = parse_asof(asof.as_deref())?;
            match runner.run_instance(instance, asof).await {
                Ok(summary) => print_outcome(instance, &summary.outcome),
                Err(err) => return Err(report_validation(err)),
            }
        }
        Commands::RunAll { asof } => {
            let asof = parse_asof(asof.as_deref())?;
            for summary in runner.run_all(asof).await? {
                print_outcome(summary.instance_id, &summary.outcome);
            }
        }
        Commands::Validate { instance } => {
            let mut invalid = false;
            match instance {
                Some(instance) => {
                    let violations = runner.validate_instance(instance).await?;
                    invalid = report_violations(instance, None, &violations);
                }
                None => {
                    for report in runner.validate_all().await? {
                        invalid |= report_violations(
                            report.instance_id,
                            Some(&report.strategy_id),
                            &report.violations,
                        );
                    }
                }
            }
            if invalid {
                std::process::exit(1);
            }
        }
        Commands::InspectRuns { instance, limit } => {
            inspect_runs(&runner, instance, limit).await?;
        }
        Commands::ListStrategies => unreachable!("handled above"),
    }

    Ok(())
}

fn parse_asof(asof: Option<&str>) -> Result<DateTime<Utc>> {
    match asof {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn print_outcome(instance_id: i64, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Skipped => {
            println!("instance {instance_id}: skipped (run already exists)");
        }
        RunOutcome::NotStarted { reason } => {
            println!("instance {instance_id}: not started: {reason}");
        }
        RunOutcome::Failed { run_id, code } => {
            println!("instance {instance_id}: run {run_id} failed ({code})");
        }
        RunOutcome::Completed {
            run_id,
            signals,
            opportunities,
            approved,
            rejected,
        } => {
            println!(
                "instance {instance_id}: run {run_id} succeeded \
                 ({signals} signals, {opportunities} opportunities, \
                 {approved} approved, {rejected} rejected)"
            );
        }
    }
}

/// Prints one instance's validation result; returns true when invalid.
fn report_violations(
    instance_id: i64,
    strategy_id: Option<&str>,
    violations: &[wheelhouse_core::Violation],
) -> bool {
    let label = strategy_id.map(|id| format!(" [{id}]")).unwrap_or_default();
    if violations.is_empty() {
        println!("instance {instance_id}{label}: config valid");
        return false;
    }
    println!(
        "instance {instance_id}{label}: {} violation(s)",
        violations.len()
    );
    for violation in violations {
        println!("  {violation}");
    }
    true
}

/// Config violations deserve a readable list, not a one-line Debug dump.
fn report_validation(err: anyhow::Error) -> anyhow::Error {
    if let Some(EngineError::ConfigValidation(violations)) = err.downcast_ref::<EngineError>() {
        eprintln!("config validation failed:");
        for violation in violations {
            eprintln!("  {violation}");
        }
    }
    err
}

async fn inspect_runs(runner: &Runner, instance: i64, limit: i64) -> Result<()> {
    let runs = runner
        .repositories()
        .runs
        .recent_for_instance(instance, limit)
        .await?;
    if runs.is_empty() {
        println!("no runs for instance {instance}");
        return Ok(());
    }

    for run in runs {
        println!(
            "run {} [{}] asof={} status={}{}",
            run.id,
            run.strategy_id,
            run.asof_ts,
            run.status,
            run.error_code
                .as_deref()
                .map(|c| format!(" error={c}"))
                .unwrap_or_default(),
        );
        for rec in runner
            .repositories()
            .recommendations
            .list_for_run(run.id)
            .await?
        {
            println!(
                "  {} {} [{}]{} {}",
                rec.action,
                rec.underlier,
                rec.status,
                rec.reject_code
                    .as_deref()
                    .map(|c| format!(" ({c})"))
                    .unwrap_or_default(),
                rec.params,
            );
        }
    }
    Ok(())
}
