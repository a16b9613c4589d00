//! Interval trigger: fire one job on a fixed cadence.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use forgeerp_jobs::{ContextProvider, RunError, RunSummary, TenantDirectory, TenantJobRunner};

/// Run `job_name` every `interval` until `shutdown` resolves.
///
/// The first run fires immediately. A run that overruns the interval skips
/// the missed ticks instead of bursting. A directory outage is logged and
/// retried on the next tick; an unknown job name stops the trigger.
///
/// Returns the number of runs that produced a summary.
pub async fn run_every<D, P>(
    runner: &TenantJobRunner<D, P>,
    job_name: &str,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<usize, RunError>
where
    D: TenantDirectory,
    P: ContextProvider,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(job = job_name, interval_secs = interval.as_secs(), "interval trigger started");
    let mut completed = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        match runner.run(job_name).await {
            Ok(summary) => {
                completed += 1;
                log_summary(&summary);
            }
            Err(RunError::DirectoryUnavailable(e)) => {
                warn!(job = job_name, error = %e, "tenant directory unavailable; retrying next tick");
            }
            Err(e @ RunError::UnknownJob(_)) => {
                error!(job = job_name, error = %e, "interval trigger stopped");
                return Err(e);
            }
        }
    }

    info!(job = job_name, runs = completed, "interval trigger stopped");
    Ok(completed)
}

pub fn log_summary(summary: &RunSummary) {
    for failed in summary.failed_tenants() {
        warn!(
            job = %summary.job_name,
            run_id = %summary.run_id,
            tenant = %failed.tenant_id,
            subdomain = %failed.subdomain,
            error = failed.error.as_deref().unwrap_or_default(),
            "tenant failed"
        );
    }
    info!(
        job = %summary.job_name,
        run_id = %summary.run_id,
        status = ?summary.status,
        tenant_count = summary.tenant_count,
        success_count = summary.success_count,
        failure_count = summary.failure_count,
        duration_ms = summary.duration_ms,
        "run summary"
    );
}
