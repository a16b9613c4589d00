use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use forgeerp_core::{Tenant, TenantId};

use super::ContextProvider;
use crate::error::ContextError;

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
    released: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Snapshot of [`InMemoryContextProvider`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ContextStats {
    pub opened: usize,
    pub committed: usize,
    pub rolled_back: usize,
    pub released: usize,
    /// Highest number of simultaneously open contexts.
    pub peak_in_flight: usize,
}

impl ContextStats {
    /// Every opened context has been released.
    pub fn is_balanced(&self) -> bool {
        self.opened == self.released
    }
}

/// Counts one release when dropped, however the context ends.
#[derive(Debug)]
struct Lease {
    counters: Arc<Counters>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Context handed out by [`InMemoryContextProvider`].
///
/// Writes are buffered and only become visible through
/// [`InMemoryContextProvider::committed_writes`] after a commit.
#[derive(Debug)]
pub struct MemoryContext {
    tenant_id: TenantId,
    schema: String,
    pending: Vec<String>,
    _lease: Lease,
}

impl MemoryContext {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn write(&mut self, entry: impl Into<String>) {
        self.pending.push(entry.into());
    }
}

/// In-memory context provider for tests/dev.
///
/// Tracks how many contexts were opened, committed, rolled back and released,
/// and can be told to fail `open` or `commit` for specific schemas.
#[derive(Debug, Default)]
pub struct InMemoryContextProvider {
    counters: Arc<Counters>,
    fail_open: RwLock<HashSet<String>>,
    fail_commit: RwLock<HashSet<String>>,
    committed: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryContextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open_for(&self, schema: impl Into<String>) {
        if let Ok(mut set) = self.fail_open.write() {
            set.insert(schema.into());
        }
    }

    pub fn fail_commit_for(&self, schema: impl Into<String>) {
        if let Ok(mut set) = self.fail_commit.write() {
            set.insert(schema.into());
        }
    }

    pub fn stats(&self) -> ContextStats {
        let c = &self.counters;
        ContextStats {
            opened: c.opened.load(Ordering::SeqCst),
            committed: c.committed.load(Ordering::SeqCst),
            rolled_back: c.rolled_back.load(Ordering::SeqCst),
            released: c.released.load(Ordering::SeqCst),
            peak_in_flight: c.peak_in_flight.load(Ordering::SeqCst),
        }
    }

    /// Writes committed to `schema`, in commit order.
    pub fn committed_writes(&self, schema: &str) -> Vec<String> {
        self.committed
            .read()
            .ok()
            .and_then(|m| m.get(schema).cloned())
            .unwrap_or_default()
    }

    fn should_fail(set: &RwLock<HashSet<String>>, schema: &str) -> bool {
        set.read().map(|s| s.contains(schema)).unwrap_or(false)
    }
}

#[async_trait]
impl ContextProvider for InMemoryContextProvider {
    type Context = MemoryContext;

    async fn open(&self, tenant: &Tenant) -> Result<MemoryContext, ContextError> {
        if Self::should_fail(&self.fail_open, &tenant.schema_name) {
            return Err(ContextError::Open(format!(
                "schema {} does not exist",
                tenant.schema_name
            )));
        }

        let c = &self.counters;
        c.opened.fetch_add(1, Ordering::SeqCst);
        let now = c.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        c.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        Ok(MemoryContext {
            tenant_id: tenant.id,
            schema: tenant.schema_name.clone(),
            pending: Vec::new(),
            _lease: Lease {
                counters: self.counters.clone(),
            },
        })
    }

    async fn commit(&self, ctx: MemoryContext) -> Result<(), ContextError> {
        if Self::should_fail(&self.fail_commit, &ctx.schema) {
            return Err(ContextError::Commit(format!(
                "could not serialize access in schema {}",
                ctx.schema
            )));
        }

        let mut committed = self
            .committed
            .write()
            .map_err(|_| ContextError::Commit("commit log lock poisoned".to_string()))?;
        committed
            .entry(ctx.schema.clone())
            .or_default()
            .extend(ctx.pending.iter().cloned());
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _ctx: MemoryContext) -> Result<(), ContextError> {
        self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
