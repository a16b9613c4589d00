mod config;
mod trigger;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use forgeerp_jobs::{
    JobRegistry, PgSchemaContextProvider, PgTenantContext, PostgresTenantDirectory,
    TenantJobRunner, register_builtin_jobs,
};

use crate::config::SchedulerConfig;

#[derive(Parser)]
#[command(
    name = "forgeerp-scheduler",
    about = "Run ForgeERP background jobs once per active tenant",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered job names
    ListJobs,

    /// Run a job once across all active tenants and print the summary as JSON
    Run {
        /// Registered job name
        job: String,
    },

    /// Run a job on a fixed interval until interrupted
    Every {
        /// Registered job name
        job: String,

        /// Seconds between runs
        #[arg(long, env = "JOB_INTERVAL_SECS", default_value_t = 300)]
        interval_secs: u64,
    },
}

fn build_registry() -> Result<JobRegistry<PgTenantContext>> {
    let mut registry = JobRegistry::new();
    register_builtin_jobs(&mut registry).context("registering built-in jobs")?;
    Ok(registry)
}

async fn build_runner(
    config: &SchedulerConfig,
    registry: JobRegistry<PgTenantContext>,
) -> Result<TenantJobRunner<PostgresTenantDirectory, PgSchemaContextProvider>> {
    if (config.db_max_connections as usize) < config.runner.max_concurrent {
        tracing::warn!(
            db_max_connections = config.db_max_connections,
            max_concurrent = config.runner.max_concurrent,
            "pool is smaller than job concurrency; tenants will wait for connections"
        );
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout)
        .connect(&config.database_url)
        .await
        .context("connecting to database")?;

    let directory = PostgresTenantDirectory::new(pool.clone())
        .with_table(config.tenant_table.clone())
        .context("configuring tenant directory")?;
    let provider = Arc::new(PgSchemaContextProvider::new(pool));

    Ok(TenantJobRunner::new(directory, provider, registry).with_config(config.runner.clone()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    forgeerp_observability::init();

    let cli = Cli::parse();
    let registry = build_registry()?;

    match cli.command {
        Commands::ListJobs => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { job } => {
            let config = SchedulerConfig::from_env()?;
            let runner = build_runner(&config, registry).await?;

            let summary = runner.run(&job).await?;
            trigger::log_summary(&summary);
            println!("{}", serde_json::to_string_pretty(&summary)?);

            Ok(if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Every { job, interval_secs } => {
            let config = SchedulerConfig::from_env()?;
            let runner = build_runner(&config, registry).await?;

            trigger::run_every(
                &runner,
                &job,
                Duration::from_secs(interval_secs.max(1)),
                shutdown_signal(),
            )
            .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
