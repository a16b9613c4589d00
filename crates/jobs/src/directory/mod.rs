//! Tenant directory: which tenants a job runs for.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use forgeerp_core::Tenant;

use crate::error::DirectoryError;

pub use memory::InMemoryTenantDirectory;
pub use postgres::PostgresTenantDirectory;

/// Read-only view of the control-plane tenant store.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Active tenants, oldest first.
    ///
    /// An empty list is a valid answer. An error means the store could not be
    /// read at all; implementations never return a partial list.
    async fn list_active(&self) -> Result<Vec<Tenant>, DirectoryError>;
}

#[async_trait]
impl<D> TenantDirectory for Arc<D>
where
    D: TenantDirectory + ?Sized,
{
    async fn list_active(&self) -> Result<Vec<Tenant>, DirectoryError> {
        (**self).list_active().await
    }
}

/// Creation time ascending, tenant id as tie-breaker.
pub(crate) fn sort_for_execution(tenants: &mut [Tenant]) {
    tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
