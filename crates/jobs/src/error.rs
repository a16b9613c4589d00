//! Error types for the tenant job runner.
//!
//! Only structural failures are errors here. A job failing for one tenant is
//! recorded in that tenant's [`TenantJobResult`](crate::TenantJobResult)
//! and never surfaces through these types.

use thiserror::Error;

/// Job registry error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("job already registered: {0}")]
    DuplicateJob(String),
    #[error("unknown job: {0}")]
    UnknownJob(String),
}

/// Tenant directory error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The control-plane store could not be read.
    #[error("tenant directory unavailable: {0}")]
    Unavailable(String),
    /// The configured tenants table is not a plain `schema.table` name.
    #[error("invalid tenant table name: {0:?}")]
    InvalidTable(String),
}

/// Execution context error (open / commit / rollback).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("invalid schema name: {0:?}")]
    InvalidSchema(String),
    #[error("failed to open tenant context: {0}")]
    Open(String),
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("rollback failed: {0}")]
    Rollback(String),
}

/// Fan-out run error.
///
/// A caller gets either a complete [`RunSummary`](crate::RunSummary) or one
/// of these, never both.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("unknown job: {0}")]
    UnknownJob(String),
    #[error("tenant directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

impl From<DirectoryError> for RunError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unavailable(msg) => RunError::DirectoryUnavailable(msg),
            DirectoryError::InvalidTable(table) => {
                RunError::DirectoryUnavailable(format!("invalid tenant table name: {table:?}"))
            }
        }
    }
}
