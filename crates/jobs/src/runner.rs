//! Fan-out runner: one job across every active tenant.
//!
//! ## Run lifecycle
//!
//! 1. Resolve the job name (unknown name fails before anything else runs).
//! 2. List active tenants (directory failure fails the whole run).
//! 3. No tenants: return a `skipped` summary.
//! 4. Otherwise admit tenants in directory order through a counting
//!    semaphore, at most `max_concurrent` in flight, one spawned task each.
//! 5. Await the tasks in directory order and aggregate a `completed` summary.
//!
//! There are no retries here. A failed tenant is reported in the summary and
//! picked up again by the next scheduled run.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, error, info, info_span, warn};

use forgeerp_core::Tenant;

use crate::context::ContextProvider;
use crate::directory::TenantDirectory;
use crate::error::RunError;
use crate::executor::execute_for_tenant;
use crate::registry::JobRegistry;
use crate::types::{RunId, RunSummary, TenantJobResult};

/// Default number of tenants executed at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Fan-out runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum tenants in flight at once. Values below 1 are treated as 1;
    /// a run never holds more permits than it has tenants.
    pub max_concurrent: usize,
    /// Upper bound for a single tenant's job body. `None` waits forever.
    pub tenant_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            tenant_timeout: None,
        }
    }
}

impl RunnerConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_tenant_timeout(mut self, timeout: Duration) -> Self {
        self.tenant_timeout = Some(timeout);
        self
    }

    /// Semaphore size for a run over `tenant_count` tenants.
    fn permits(&self, tenant_count: usize) -> usize {
        self.max_concurrent
            .min(tenant_count)
            .min(Semaphore::MAX_PERMITS)
            .max(1)
    }
}

/// Runs registered jobs once per active tenant.
pub struct TenantJobRunner<D, P: ContextProvider> {
    directory: D,
    provider: Arc<P>,
    registry: Arc<JobRegistry<P::Context>>,
    config: RunnerConfig,
}

impl<D, P> TenantJobRunner<D, P>
where
    D: TenantDirectory,
    P: ContextProvider,
{
    /// Build a runner. The registry is frozen from here on.
    pub fn new(directory: D, provider: Arc<P>, registry: JobRegistry<P::Context>) -> Self {
        Self {
            directory,
            provider,
            registry: Arc::new(registry),
            config: RunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run `job_name` once for every active tenant.
    ///
    /// Returns either a complete summary (including the `skipped` case) or a
    /// structural error; per-tenant failures are only ever reported inside
    /// the summary.
    pub async fn run(&self, job_name: &str) -> Result<RunSummary, RunError> {
        let job = self
            .registry
            .resolve(job_name)
            .map_err(|_| RunError::UnknownJob(job_name.to_string()))?;

        let run_id = RunId::new();
        let started_at = Utc::now();
        let started = Instant::now();

        debug!(job = job_name, run_id = %run_id, "listing tenants");
        let tenants = self.directory.list_active().await.map_err(|e| {
            error!(job = job_name, run_id = %run_id, error = %e, "tenant directory unavailable");
            RunError::from(e)
        })?;

        if tenants.is_empty() {
            info!(job = job_name, run_id = %run_id, "no active tenants; run skipped");
            return Ok(RunSummary::skipped(run_id, job_name, started_at, started));
        }

        let permits = self.config.permits(tenants.len());
        info!(
            job = job_name,
            run_id = %run_id,
            tenant_count = tenants.len(),
            max_concurrent = permits,
            "executing job across tenants"
        );

        let gate = Arc::new(Semaphore::new(permits));
        let mut slots: Vec<Result<Spawned, TenantJobResult>> = Vec::with_capacity(tenants.len());

        for tenant in &tenants {
            // Admission follows directory order: the next tenant is not
            // spawned until a permit is free.
            let permit = match gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    slots.push(Err(TenantJobResult::finish(
                        job_name,
                        tenant,
                        Utc::now(),
                        Instant::now(),
                        Err("concurrency gate closed".to_string()),
                    )));
                    continue;
                }
            };

            let provider = self.provider.clone();
            let job = job.clone();
            let job_name = job_name.to_string();
            let tenant = tenant.clone();
            let timeout = self.config.tenant_timeout;
            let span = info_span!("tenant_job", run_id = %run_id, tenant = %tenant.id);

            let started_at = Utc::now();
            let started = Instant::now();
            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    execute_for_tenant(&*provider, &*job, &job_name, &tenant, timeout).await
                }
                .instrument(span),
            );
            slots.push(Ok(Spawned {
                started_at,
                started,
                handle,
            }));
        }

        let mut results = Vec::with_capacity(tenants.len());
        for (tenant, slot) in tenants.iter().zip(slots) {
            let result = match slot {
                Ok(spawned) => match spawned.handle.await {
                    Ok(result) => result,
                    Err(join_err) => {
                        let message = join_error_message(join_err);
                        warn!(
                            job = job_name,
                            run_id = %run_id,
                            tenant = %tenant.id,
                            subdomain = %tenant.subdomain,
                            error = %message,
                            "tenant job task aborted"
                        );
                        TenantJobResult::finish(
                            job_name,
                            tenant,
                            spawned.started_at,
                            spawned.started,
                            Err(message),
                        )
                    }
                },
                Err(result) => result,
            };
            results.push(result);
        }

        let summary = RunSummary::completed(run_id, job_name, started_at, started, results);
        info!(
            job = job_name,
            run_id = %run_id,
            tenant_count = summary.tenant_count,
            success_count = summary.success_count,
            failure_count = summary.failure_count,
            duration_ms = summary.duration_ms,
            "job run completed"
        );
        Ok(summary)
    }
}

/// A tenant task in flight, with the moment it was started.
struct Spawned {
    started_at: DateTime<Utc>,
    started: Instant,
    handle: JoinHandle<TenantJobResult>,
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        format!("job panicked: {}", panic_message(err.into_panic()))
    } else {
        "job task cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
