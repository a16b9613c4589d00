//! Per-tenant executor: one job, one tenant, one result.
//!
//! This is the isolation boundary of the runner. [`execute_for_tenant`]
//! returns a [`TenantJobResult`], not a `Result`, so a failure for one tenant
//! can only ever become data in that tenant's result.

use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use forgeerp_core::Tenant;

use crate::context::ContextProvider;
use crate::error::ContextError;
use crate::registry::TenantJob;
use crate::types::TenantJobResult;

/// Why a tenant's execution failed.
#[derive(Debug, Error)]
enum TenantFailure {
    #[error("{0}")]
    Open(ContextError),
    #[error("{0:#}")]
    Job(anyhow::Error),
    #[error("timeout after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("{0}")]
    Commit(ContextError),
}

impl TenantFailure {
    fn stage(&self) -> &'static str {
        match self {
            TenantFailure::Open(_) => "open",
            TenantFailure::Job(_) => "job",
            TenantFailure::Timeout(_) => "timeout",
            TenantFailure::Commit(_) => "commit",
        }
    }
}

/// Run `job` for `tenant` inside a freshly opened context.
///
/// Open → job body → commit on success, rollback on failure or timeout. The
/// context is released on every path. `timeout` bounds the job body only;
/// pool acquisition is bounded by the pool's own acquire timeout. Duration in
/// the result includes open and commit/rollback time.
pub async fn execute_for_tenant<P>(
    provider: &P,
    job: &dyn TenantJob<P::Context>,
    job_name: &str,
    tenant: &Tenant,
    timeout: Option<Duration>,
) -> TenantJobResult
where
    P: ContextProvider,
{
    let started_at = Utc::now();
    let started = Instant::now();

    let outcome = run_in_context(provider, job, tenant, timeout).await;

    match &outcome {
        Ok(()) => debug!(
            job = job_name,
            tenant = %tenant.id,
            subdomain = %tenant.subdomain,
            duration_ms = started.elapsed().as_millis() as u64,
            "tenant job succeeded"
        ),
        Err(failure) => warn!(
            job = job_name,
            tenant = %tenant.id,
            subdomain = %tenant.subdomain,
            stage = failure.stage(),
            error = %failure,
            "tenant job failed"
        ),
    }

    TenantJobResult::finish(
        job_name,
        tenant,
        started_at,
        started,
        outcome.map_err(|f| f.to_string()),
    )
}

async fn run_in_context<P>(
    provider: &P,
    job: &dyn TenantJob<P::Context>,
    tenant: &Tenant,
    timeout: Option<Duration>,
) -> Result<(), TenantFailure>
where
    P: ContextProvider,
{
    let mut ctx = provider.open(tenant).await.map_err(TenantFailure::Open)?;

    let body = job.execute(&mut ctx, tenant);
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, body).await {
            Ok(result) => result.map_err(TenantFailure::Job),
            Err(_) => Err(TenantFailure::Timeout(limit)),
        },
        None => body.await.map_err(TenantFailure::Job),
    };

    match outcome {
        Ok(()) => provider.commit(ctx).await.map_err(TenantFailure::Commit),
        Err(failure) => {
            if let Err(e) = provider.rollback(ctx).await {
                warn!(
                    tenant = %tenant.id,
                    subdomain = %tenant.subdomain,
                    error = %e,
                    "rollback after failed tenant job also failed"
                );
            }
            Err(failure)
        }
    }
}
