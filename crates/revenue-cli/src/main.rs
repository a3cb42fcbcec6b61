use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use revenue_core::{RevenueConfig, Stage};
use revenue_pipeline::{Pipeline, StageOutput};
use revenue_scheduler::{RetryPolicy, Schedule, SchedulerEngine, PIPELINE_JOB_NAME};
use tracing::info;

mod output;

#[derive(Parser)]
#[command(
    name = "daily-revenue",
    about = "Extract orders, aggregate revenue per day, and chart it on a daily schedule",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ~/.daily-revenue/revenue.toml)
    #[arg(long, global = true, env = "REVENUE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the sales database and write the raw snapshot
    Fetch,

    /// Aggregate the raw snapshot into daily revenue
    Aggregate,

    /// Render the daily revenue chart
    Render,

    /// Run all three stages now, with retries, and record the run
    Run {
        /// Print the run outcome as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Run the pipeline on its daily schedule until interrupted
    Serve,

    /// Show recent task attempts
    History {
        /// Number of attempts to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,

        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "revenue_cli=info,revenue_pipeline=info,revenue_scheduler=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = RevenueConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Fetch => run_stage(config, Stage::Extract),
        Commands::Aggregate => run_stage(config, Stage::Aggregate),
        Commands::Render => run_stage(config, Stage::Render),
        Commands::Run { json } => run_once(config, json).await,
        Commands::Serve => serve(config).await,
        Commands::History { limit, json } => history(&config, limit, json),
    }
}

fn run_stage(config: RevenueConfig, stage: Stage) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config);
    let output = pipeline
        .run_stage(stage)
        .with_context(|| format!("{} failed", stage.task_id()))?;
    match output {
        StageOutput::Extracted(rows) => println!("Fetched {rows} order lines"),
        StageOutput::Aggregated(days) => println!("Aggregated revenue for {days} days"),
        StageOutput::Rendered(path) => println!("Revenue chart saved to {}", path.display()),
    }
    Ok(())
}

async fn run_once(config: RevenueConfig, json: bool) -> anyhow::Result<()> {
    let chart = config.output.chart.clone();
    let mut engine = open_engine(config)?;
    let outcome = engine.trigger(PIPELINE_JOB_NAME).await?;

    if json {
        output::print_json(&outcome)?;
    } else if outcome.succeeded() {
        println!("Revenue chart saved to {}", chart.display());
    }
    anyhow::ensure!(
        outcome.succeeded(),
        "run {} ended in state {}",
        outcome.run_id,
        outcome.state
    );
    Ok(())
}

async fn serve(config: RevenueConfig) -> anyhow::Result<()> {
    let engine = open_engine(config)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move { engine.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, stopping after the current run");
    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}

fn history(config: &RevenueConfig, limit: usize, json: bool) -> anyhow::Result<()> {
    let conn = open_state_db(config)?;
    revenue_scheduler::db::init_db(&conn)?;
    let runs = revenue_scheduler::db::recent_task_runs(&conn, limit)?;

    if json {
        return output::print_json(&runs);
    }
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }
    output::print_table(
        &["RUN", "TASK", "ATTEMPT", "STATUS", "STARTED", "ERROR"],
        output::task_run_rows(&runs),
    );
    Ok(())
}

/// Build an engine over the scheduler database with the pipeline registered
/// under its daily schedule.
fn open_engine(config: RevenueConfig) -> anyhow::Result<SchedulerEngine<Pipeline>> {
    let conn = open_state_db(&config)?;
    let policy = RetryPolicy::from(&config.schedule);
    let schedule = Schedule::daily(&config.schedule);
    let engine = SchedulerEngine::new(conn, Arc::new(Pipeline::new(config)), policy)?;
    engine.register(PIPELINE_JOB_NAME, schedule)?;
    Ok(engine)
}

fn open_state_db(config: &RevenueConfig) -> anyhow::Result<rusqlite::Connection> {
    let path = &config.database.path;
    ensure_parent_dir(path);
    info!(path = %path.display(), "opening scheduler database");
    let conn = rusqlite::Connection::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

fn ensure_parent_dir(path: &std::path::Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
