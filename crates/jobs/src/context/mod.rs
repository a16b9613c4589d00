//! Schema-scoped execution contexts.
//!
//! A context binds one data connection to one tenant's schema for the length
//! of one job invocation. The per-tenant executor owns the lifecycle: it opens
//! the context, lends it to the job body, then commits or rolls back. Both
//! `commit` and `rollback` consume the context, and dropping a context without
//! either must release it too (timeouts and panics take that path).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use forgeerp_core::Tenant;

use crate::error::ContextError;

pub use memory::{ContextStats, InMemoryContextProvider, MemoryContext};
pub use postgres::{PgSchemaContextProvider, PgTenantContext};

/// Opens and finishes tenant-scoped execution contexts.
#[async_trait]
pub trait ContextProvider: Send + Sync + 'static {
    type Context: Send + 'static;

    /// Acquire a connection and scope it to `tenant`'s schema.
    async fn open(&self, tenant: &Tenant) -> Result<Self::Context, ContextError>;

    /// Commit the context's work and release it.
    async fn commit(&self, ctx: Self::Context) -> Result<(), ContextError>;

    /// Discard the context's work and release it.
    async fn rollback(&self, ctx: Self::Context) -> Result<(), ContextError>;
}
