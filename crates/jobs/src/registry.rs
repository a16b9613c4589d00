//! Job registry: name → job capability, populated once at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use forgeerp_core::Tenant;

use crate::error::RegistryError;

/// A unit of work executed once per tenant.
///
/// `C` is the execution context type handed out by the
/// [`ContextProvider`](crate::ContextProvider). A job signals failure by
/// returning `Err`; it must not commit, roll back, or otherwise manage the
/// context's lifecycle.
#[async_trait]
pub trait TenantJob<C>: Send + Sync {
    async fn execute(&self, ctx: &mut C, tenant: &Tenant) -> anyhow::Result<()>;
}

/// Registered jobs, keyed by their operator-facing name.
///
/// Registration needs `&mut self`; once the registry is handed to a
/// [`TenantJobRunner`](crate::TenantJobRunner) it is only ever read.
pub struct JobRegistry<C> {
    jobs: HashMap<String, Arc<dyn TenantJob<C>>>,
}

impl<C: Send + 'static> JobRegistry<C> {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Register `job` under `name`.
    ///
    /// Fails if the name is taken; the existing registration is kept.
    pub fn register<J>(&mut self, name: impl Into<String>, job: J) -> Result<(), RegistryError>
    where
        J: TenantJob<C> + 'static,
    {
        let name = name.into();
        if self.jobs.contains_key(&name) {
            return Err(RegistryError::DuplicateJob(name));
        }
        self.jobs.insert(name, Arc::new(job));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn TenantJob<C>>, RegistryError> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownJob(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.jobs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl<C: Send + 'static> Default for JobRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + 'static> fmt::Debug for JobRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.names())
            .finish()
    }
}
