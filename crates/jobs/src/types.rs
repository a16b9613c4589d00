//! Run and per-tenant result types.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use forgeerp_core::{Tenant, TenantId};

/// Identifier of one fan-out run, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one (job, tenant) execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    Failed,
}

/// Result of running one job against one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantJobResult {
    pub tenant_id: TenantId,
    /// Tenant routing key, kept for operator diagnosis.
    pub subdomain: String,
    pub job_name: String,
    pub status: JobOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl TenantJobResult {
    /// Finalize a result whose clock started at (`started_at`, `started`).
    pub(crate) fn finish(
        job_name: &str,
        tenant: &Tenant,
        started_at: DateTime<Utc>,
        started: Instant,
        outcome: Result<(), String>,
    ) -> Self {
        let (status, error) = match outcome {
            Ok(()) => (JobOutcome::Success, None),
            Err(e) => (JobOutcome::Failed, Some(e)),
        };
        Self {
            tenant_id: tenant.id,
            subdomain: tenant.subdomain.clone(),
            job_name: job_name.to_string(),
            status,
            started_at,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobOutcome::Success
    }
}

/// Terminal status of a fan-out run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No active tenants; no per-tenant work was attempted.
    Skipped,
    /// Every tenant produced a result.
    Completed,
}

/// Aggregate outcome of one fan-out run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub job_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub tenant_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Per-tenant results, in tenant directory order.
    pub results: Vec<TenantJobResult>,
}

impl RunSummary {
    pub(crate) fn skipped(
        run_id: RunId,
        job_name: &str,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> Self {
        Self {
            run_id,
            job_name: job_name.to_string(),
            status: RunStatus::Skipped,
            started_at,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            tenant_count: 0,
            success_count: 0,
            failure_count: 0,
            results: Vec::new(),
        }
    }

    pub(crate) fn completed(
        run_id: RunId,
        job_name: &str,
        started_at: DateTime<Utc>,
        started: Instant,
        results: Vec<TenantJobResult>,
    ) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Self {
            run_id,
            job_name: job_name.to_string(),
            status: RunStatus::Completed,
            started_at,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            tenant_count: results.len(),
            success_count,
            failure_count: results.len() - success_count,
            results,
        }
    }

    pub fn failed_tenants(&self) -> impl Iterator<Item = &TenantJobResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}
