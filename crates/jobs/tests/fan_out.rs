//! Fan-out behaviour of `TenantJobRunner` over in-memory adapters.
//!
//! Verifies:
//! - one result per tenant, in directory order, whatever the completion order
//! - a failing tenant never affects the others
//! - every opened context is released
//! - structural failures (unknown job, directory down) surface as errors

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;

use forgeerp_core::{Tenant, TenantStatus};
use forgeerp_jobs::{
    InMemoryContextProvider, InMemoryTenantDirectory, JobOutcome, JobRegistry, MemoryContext,
    RunError, RunStatus, RunSummary, RunnerConfig, TenantJob, TenantJobRunner,
};

type TestRunner = TenantJobRunner<Arc<InMemoryTenantDirectory>, InMemoryContextProvider>;

/// `count` active tenants, created one minute apart, oldest first.
fn tenants(count: usize) -> Vec<Tenant> {
    let base = Utc::now() - ChronoDuration::days(1);
    (0..count)
        .map(|i| {
            Tenant::new(format!("Tenant {i}"), format!("t{i}"), format!("tenant_{i}"))
                .with_created_at(base + ChronoDuration::minutes(i as i64))
        })
        .collect()
}

/// Writes a marker into the tenant's context; fails for the listed subdomains.
struct MarkTenant {
    fail_for: Vec<String>,
}

impl MarkTenant {
    fn ok() -> Self {
        Self { fail_for: vec![] }
    }

    fn failing(subdomains: &[&str]) -> Self {
        Self {
            fail_for: subdomains.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TenantJob<MemoryContext> for MarkTenant {
    async fn execute(&self, ctx: &mut MemoryContext, tenant: &Tenant) -> anyhow::Result<()> {
        anyhow::ensure!(ctx.schema() == tenant.schema_name, "context bound to wrong schema");
        ctx.write(format!("marked {}", tenant.subdomain));
        if self.fail_for.contains(&tenant.subdomain) {
            anyhow::bail!("escalation rules missing for {}", tenant.subdomain);
        }
        Ok(())
    }
}

/// Sleeps for the tenant's `delay_ms` setting, then records completion.
struct Delayed {
    finished: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TenantJob<MemoryContext> for Delayed {
    async fn execute(&self, _ctx: &mut MemoryContext, tenant: &Tenant) -> anyhow::Result<()> {
        let delay = tenant.settings["delay_ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.finished.lock().unwrap().push(tenant.subdomain.clone());
        Ok(())
    }
}

fn setup(
    tenants: Vec<Tenant>,
    job: impl TenantJob<MemoryContext> + 'static,
    config: RunnerConfig,
) -> (TestRunner, Arc<InMemoryTenantDirectory>, Arc<InMemoryContextProvider>) {
    let directory = Arc::new(InMemoryTenantDirectory::with_tenants(tenants));
    let provider = Arc::new(InMemoryContextProvider::new());
    let mut registry = JobRegistry::new();
    registry.register("job", job).unwrap();
    let runner = TenantJobRunner::new(directory.clone(), provider.clone(), registry).with_config(config);
    (runner, directory, provider)
}

fn subdomains(summary: &RunSummary) -> Vec<&str> {
    summary.results.iter().map(|r| r.subdomain.as_str()).collect()
}

#[tokio::test]
async fn scenario_all_tenants_succeed() {
    let (runner, _, provider) = setup(tenants(3), MarkTenant::ok(), RunnerConfig::default());

    let summary = runner.run("job").await.unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.job_name, "job");
    assert_eq!(summary.tenant_count, 3);
    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failure_count, 0);
    assert!(summary.results.iter().all(|r| r.status == JobOutcome::Success));
    for i in 0..3 {
        assert_eq!(
            provider.committed_writes(&format!("tenant_{i}")),
            vec![format!("marked t{i}")]
        );
    }
}

#[tokio::test]
async fn scenario_second_tenant_fails() {
    let all = tenants(3);
    let second = all[1].id;
    let (runner, _, provider) = setup(all, MarkTenant::failing(&["t1"]), RunnerConfig::default());

    let summary = runner.run("job").await.unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.tenant_count, 3);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);

    let failed: Vec<_> = summary.failed_tenants().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].tenant_id, second);
    assert_eq!(
        failed[0].error.as_deref(),
        Some("escalation rules missing for t1")
    );

    // The failed tenant's writes were rolled back; the others committed.
    assert!(provider.committed_writes("tenant_1").is_empty());
    assert_eq!(provider.committed_writes("tenant_0").len(), 1);
    assert_eq!(provider.committed_writes("tenant_2").len(), 1);
}

#[tokio::test]
async fn scenario_no_active_tenants_is_skipped() {
    let inactive = vec![
        Tenant::new("Old", "old", "tenant_old").with_status(TenantStatus::Deleted),
        Tenant::new("Paused", "paused", "tenant_paused").with_status(TenantStatus::Suspended),
    ];
    let (runner, directory, provider) = setup(inactive, MarkTenant::ok(), RunnerConfig::default());

    let summary = runner.run("job").await.unwrap();

    assert_eq!(summary.status, RunStatus::Skipped);
    assert_eq!(summary.tenant_count, 0);
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failure_count, 0);
    assert!(summary.results.is_empty());
    assert_eq!(directory.list_calls(), 1);
    assert_eq!(provider.stats().opened, 0);
}

#[tokio::test]
async fn scenario_directory_unavailable_fails_the_run() {
    let (runner, directory, provider) = setup(tenants(3), MarkTenant::ok(), RunnerConfig::default());
    directory.set_unavailable(true);

    let err = runner.run("job").await.unwrap_err();

    assert!(matches!(err, RunError::DirectoryUnavailable(_)));
    assert_eq!(provider.stats().opened, 0);
}

#[tokio::test]
async fn unknown_job_fails_fast() {
    let (runner, directory, _) = setup(tenants(3), MarkTenant::ok(), RunnerConfig::default());

    let err = runner.run("nonexistent").await.unwrap_err();

    assert_eq!(err, RunError::UnknownJob("nonexistent".to_string()));
    assert_eq!(directory.list_calls(), 0);
}

#[tokio::test]
async fn contexts_are_released_on_success_and_failure() {
    let (runner, _, provider) = setup(
        tenants(6),
        MarkTenant::failing(&["t1", "t4"]),
        RunnerConfig::default().with_max_concurrent(2),
    );

    runner.run("job").await.unwrap();

    let stats = provider.stats();
    assert_eq!(stats.opened, 6);
    assert_eq!(stats.committed, 4);
    assert_eq!(stats.rolled_back, 2);
    assert_eq!(stats.released, 6);
    assert!(stats.is_balanced());
}

#[tokio::test]
async fn open_failure_is_recorded_and_the_run_continues() {
    let (runner, _, provider) = setup(tenants(3), MarkTenant::ok(), RunnerConfig::default());
    provider.fail_open_for("tenant_0");

    let summary = runner.run("job").await.unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.results[0].status, JobOutcome::Failed);
    assert!(summary.results[0].error.as_deref().unwrap().contains("tenant_0"));
    assert!(provider.stats().is_balanced());
}

#[tokio::test(start_paused = true)]
async fn summary_keeps_directory_order_whatever_finishes_first() {
    let count = 5;
    let delayed: Vec<Tenant> = tenants(count)
        .into_iter()
        .enumerate()
        .map(|(i, t)| t.with_settings(serde_json::json!({ "delay_ms": (count - i) * 100 })))
        .collect();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let (runner, _, _) = setup(
        delayed,
        Delayed {
            finished: finished.clone(),
        },
        RunnerConfig::default().with_max_concurrent(count),
    );

    let summary = runner.run("job").await.unwrap();

    // Completion order is the reverse of directory order...
    assert_eq!(
        *finished.lock().unwrap(),
        vec!["t4", "t3", "t2", "t1", "t0"]
    );
    // ...but the summary is not.
    assert_eq!(subdomains(&summary), vec!["t0", "t1", "t2", "t3", "t4"]);
}

#[tokio::test(start_paused = true)]
async fn in_flight_tenants_never_exceed_the_limit() {
    let slow: Vec<Tenant> = tenants(12)
        .into_iter()
        .map(|t| t.with_settings(serde_json::json!({ "delay_ms": 50 })))
        .collect();
    let (runner, _, provider) = setup(
        slow,
        Delayed {
            finished: Arc::new(Mutex::new(Vec::new())),
        },
        RunnerConfig::default().with_max_concurrent(3),
    );

    let summary = runner.run("job").await.unwrap();

    assert_eq!(summary.success_count, 12);
    assert_eq!(provider.stats().peak_in_flight, 3);
}

#[tokio::test(start_paused = true)]
async fn hung_tenant_times_out_without_blocking_others() {
    let mut all = tenants(3);
    all[1].settings = serde_json::json!({ "delay_ms": 3_600_000 });
    let (runner, _, provider) = setup(
        all,
        Delayed {
            finished: Arc::new(Mutex::new(Vec::new())),
        },
        RunnerConfig::default()
            .with_max_concurrent(1)
            .with_tenant_timeout(Duration::from_secs(5)),
    );

    let summary = runner.run("job").await.unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.results[1].error.as_deref(), Some("timeout after 5000ms"));
    assert!(provider.stats().is_balanced());
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: one failing tenant costs exactly one failure, and every
    /// tenant still reports exactly once, in directory order.
    #[test]
    fn single_failure_is_isolated(
        (count, failing) in (1usize..12).prop_flat_map(|n| (Just(n), 0..n)),
        max_concurrent in 1usize..6,
    ) {
        let all = tenants(count);
        let expected: Vec<_> = all.iter().map(|t| t.id).collect();
        let failing_sub = format!("t{failing}");
        let (runner, _, provider) = setup(
            all,
            MarkTenant::failing(&[failing_sub.as_str()]),
            RunnerConfig::default().with_max_concurrent(max_concurrent),
        );

        let summary = block_on(runner.run("job")).unwrap();

        prop_assert_eq!(summary.tenant_count, count);
        prop_assert_eq!(summary.failure_count, 1);
        prop_assert_eq!(summary.success_count, count - 1);
        prop_assert_eq!(summary.results[failing].status, JobOutcome::Failed);
        let ids: Vec<_> = summary.results.iter().map(|r| r.tenant_id).collect();
        prop_assert_eq!(ids, expected);
        prop_assert!(provider.stats().is_balanced());
    }

    /// Property: N active tenants always yield N results, each tenant once,
    /// regardless of which of them fail.
    #[test]
    fn every_tenant_reports_exactly_once(
        failures in prop::collection::vec(any::<bool>(), 1..16),
    ) {
        let count = failures.len();
        let failing: Vec<String> = failures
            .iter()
            .enumerate()
            .filter(|(_, f)| **f)
            .map(|(i, _)| format!("t{i}"))
            .collect();
        let failing_refs: Vec<&str> = failing.iter().map(String::as_str).collect();
        let (runner, _, _) = setup(
            tenants(count),
            MarkTenant::failing(&failing_refs),
            RunnerConfig::default().with_max_concurrent(3),
        );

        let summary = block_on(runner.run("job")).unwrap();

        prop_assert_eq!(summary.results.len(), count);
        prop_assert_eq!(summary.success_count + summary.failure_count, count);
        prop_assert_eq!(summary.failure_count, failing.len());
        let mut seen: Vec<_> = summary.results.iter().map(|r| r.tenant_id).collect();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), count);
    }
}
