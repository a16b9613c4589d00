//! Tenant-aware background jobs.
//!
//! Runs a named job once per active tenant, each inside its own
//! schema-scoped context, and reports one result per tenant.
//!
//! ## Components
//!
//! - `JobRegistry`: name → `TenantJob`, filled at startup, read-only afterwards
//! - `TenantDirectory`: lists active tenants (Postgres or in-memory)
//! - `ContextProvider`: opens/commits/rolls back tenant-scoped contexts
//! - `execute_for_tenant`: one job, one tenant, one `TenantJobResult`
//! - `TenantJobRunner`: bounded fan-out across tenants into a `RunSummary`
//!
//! A job failing for one tenant never affects another tenant or the caller;
//! only an unknown job name or an unreadable directory fails a run.

pub mod builtin;
pub mod context;
pub mod directory;
pub mod error;
pub mod executor;
pub mod registry;
pub mod runner;
pub mod types;

mod ident;

pub use builtin::{TENANT_HEALTHCHECK, TenantHealthcheck, register_builtin_jobs};
pub use context::{
    ContextProvider, ContextStats, InMemoryContextProvider, MemoryContext,
    PgSchemaContextProvider, PgTenantContext,
};
pub use directory::{InMemoryTenantDirectory, PostgresTenantDirectory, TenantDirectory};
pub use error::{ContextError, DirectoryError, RegistryError, RunError};
pub use executor::execute_for_tenant;
pub use registry::{JobRegistry, TenantJob};
pub use runner::{DEFAULT_MAX_CONCURRENT, RunnerConfig, TenantJobRunner};
pub use types::{JobOutcome, RunId, RunStatus, RunSummary, TenantJobResult};
