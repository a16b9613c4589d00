use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use forgeerp_core::Tenant;

use super::{TenantDirectory, sort_for_execution};
use crate::error::DirectoryError;

/// In-memory tenant directory for tests/dev.
///
/// Counts `list_active` calls and can simulate an unreachable store.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<Vec<Tenant>>,
    unavailable: AtomicBool,
    list_calls: AtomicUsize,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        Self {
            tenants: RwLock::new(tenants.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn insert(&self, tenant: Tenant) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.push(tenant);
        }
    }

    /// Make subsequent `list_active` calls fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn list_active(&self) -> Result<Vec<Tenant>, DirectoryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable(
                "in-memory directory marked unavailable".to_string(),
            ));
        }

        let tenants = self
            .tenants
            .read()
            .map_err(|_| DirectoryError::Unavailable("tenant list lock poisoned".to_string()))?;

        let mut active: Vec<Tenant> = tenants.iter().filter(|t| t.is_active()).cloned().collect();
        sort_for_execution(&mut active);
        Ok(active)
    }
}
