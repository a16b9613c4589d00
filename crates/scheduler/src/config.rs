//! Scheduler configuration, read from the environment.

use std::time::Duration;

use anyhow::{Context, Result, bail};

use forgeerp_jobs::RunnerConfig;
use forgeerp_jobs::directory::postgres::DEFAULT_TENANT_TABLE;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub tenant_table: String,
    pub runner: RunnerConfig,
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;

        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?;
        let db_acquire_timeout =
            Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 30)?);
        let max_concurrent: usize =
            parse_or(&lookup, "JOB_MAX_CONCURRENT", forgeerp_jobs::DEFAULT_MAX_CONCURRENT)?;
        if max_concurrent == 0 {
            bail!("JOB_MAX_CONCURRENT must be at least 1");
        }
        let tenant_timeout = lookup("JOB_TENANT_TIMEOUT_SECS")
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .with_context(|| format!("JOB_TENANT_TIMEOUT_SECS is not a number: {v:?}"))
            })
            .transpose()?
            .map(Duration::from_secs);
        let tenant_table =
            lookup("TENANT_TABLE").unwrap_or_else(|| DEFAULT_TENANT_TABLE.to_string());

        let mut runner = RunnerConfig::default().with_max_concurrent(max_concurrent);
        runner.tenant_timeout = tenant_timeout;

        Ok(Self {
            database_url,
            db_max_connections,
            db_acquire_timeout,
            tenant_table,
            runner,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} is not a valid number: {v:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config =
            SchedulerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/erp")]))
                .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/erp");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.tenant_table, "public.tenants");
        assert_eq!(config.runner.max_concurrent, 5);
        assert!(config.runner.tenant_timeout.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = SchedulerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("DB_MAX_CONNECTIONS", "20"),
            ("JOB_MAX_CONCURRENT", " 8 "),
            ("JOB_TENANT_TIMEOUT_SECS", "120"),
            ("TENANT_TABLE", "control.tenants"),
        ]))
        .unwrap();

        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.runner.max_concurrent, 8);
        assert_eq!(config.runner.tenant_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.tenant_table, "control.tenants");
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = SchedulerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn bad_numbers_are_errors() {
        let err = SchedulerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("JOB_MAX_CONCURRENT", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("JOB_MAX_CONCURRENT"));

        let err = SchedulerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("JOB_MAX_CONCURRENT", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }
}
