//! Postgres schema-per-tenant contexts.
//!
//! Every context is a transaction on a pooled connection with
//! `search_path` set through `set_config(..., is_local => true)`. The setting
//! is transaction-local, so it ends with the commit or rollback and the
//! connection goes back to the pool without any tenant binding. Dropping a
//! `PgTenantContext` without finishing it rolls the transaction back when the
//! connection is returned.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use forgeerp_core::Tenant;

use super::ContextProvider;
use crate::error::ContextError;
use crate::ident::is_plain_identifier;

/// A transaction pinned to one tenant's schema.
pub struct PgTenantContext {
    tx: Transaction<'static, Postgres>,
    schema: String,
}

impl PgTenantContext {
    /// Connection to run the job's queries on.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

impl std::fmt::Debug for PgTenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTenantContext")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Hands out [`PgTenantContext`]s from a shared pool.
#[derive(Debug, Clone)]
pub struct PgSchemaContextProvider {
    pool: PgPool,
}

impl PgSchemaContextProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `search_path` value for a tenant schema; `public` stays visible for shared
/// extensions and functions.
pub(crate) fn search_path_for(schema: &str) -> Result<String, ContextError> {
    if !is_plain_identifier(schema) {
        return Err(ContextError::InvalidSchema(schema.to_string()));
    }
    Ok(format!("\"{schema}\", public"))
}

#[async_trait]
impl ContextProvider for PgSchemaContextProvider {
    type Context = PgTenantContext;

    #[instrument(skip(self, tenant), fields(tenant = %tenant.id, schema = %tenant.schema_name), err)]
    async fn open(&self, tenant: &Tenant) -> Result<PgTenantContext, ContextError> {
        let search_path = search_path_for(&tenant.schema_name)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ContextError::Open(e.to_string()))?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = $1)")
                .bind(&tenant.schema_name)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| ContextError::Open(e.to_string()))?;
        if !exists {
            return Err(ContextError::Open(format!(
                "schema {} does not exist",
                tenant.schema_name
            )));
        }

        sqlx::query("SELECT set_config('search_path', $1, true)")
            .bind(&search_path)
            .execute(&mut *tx)
            .await
            .map_err(|e| ContextError::Open(e.to_string()))?;

        debug!(schema = %tenant.schema_name, "tenant context opened");
        Ok(PgTenantContext {
            tx,
            schema: tenant.schema_name.clone(),
        })
    }

    async fn commit(&self, ctx: PgTenantContext) -> Result<(), ContextError> {
        ctx.tx
            .commit()
            .await
            .map_err(|e| ContextError::Commit(e.to_string()))
    }

    async fn rollback(&self, ctx: PgTenantContext) -> Result<(), ContextError> {
        ctx.tx
            .rollback()
            .await
            .map_err(|e| ContextError::Rollback(e.to_string()))
    }
}
