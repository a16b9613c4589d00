//! Jobs shipped with the runner.

use anyhow::{Context as _, ensure};
use async_trait::async_trait;

use forgeerp_core::Tenant;

use crate::context::PgTenantContext;
use crate::error::RegistryError;
use crate::registry::{JobRegistry, TenantJob};

pub const TENANT_HEALTHCHECK: &str = "tenant_healthcheck";

/// Verifies the tenant context really resolves to the tenant's schema.
///
/// `current_schema()` falls through to `public` when the tenant schema is
/// missing from the search path, so a mismatch means the tenant is not
/// reachable in isolation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TenantHealthcheck;

#[async_trait]
impl TenantJob<PgTenantContext> for TenantHealthcheck {
    async fn execute(&self, ctx: &mut PgTenantContext, tenant: &Tenant) -> anyhow::Result<()> {
        let current: Option<String> = sqlx::query_scalar("SELECT current_schema()::text")
            .fetch_one(ctx.conn())
            .await
            .context("querying current_schema()")?;

        let current = current.unwrap_or_default();
        ensure!(
            current == tenant.schema_name,
            "search path resolves to {current:?}, expected {:?}",
            tenant.schema_name
        );
        Ok(())
    }
}

/// Register every built-in job.
pub fn register_builtin_jobs(
    registry: &mut JobRegistry<PgTenantContext>,
) -> Result<(), RegistryError> {
    registry.register(TENANT_HEALTHCHECK, TenantHealthcheck)?;
    Ok(())
}
