//! Postgres-backed tenant directory.
//!
//! Reads the control-plane tenants table (`public.tenants` unless configured
//! otherwise). The directory never writes.
//!
//! ## Error Mapping
//!
//! Any SQLx error (pool closed, network failure, missing table) and any row
//! that fails to decode map to `DirectoryError::Unavailable`. A table name
//! that is not a plain identifier is rejected up front with
//! `DirectoryError::InvalidTable`. A row that cannot be decoded fails the
//! whole listing: returning the other rows would silently skip a tenant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use forgeerp_core::{Tenant, TenantId, TenantStatus};

use super::{TenantDirectory, sort_for_execution};
use crate::error::DirectoryError;
use crate::ident::is_plain_qualified_name;

/// Default control-plane table.
pub const DEFAULT_TENANT_TABLE: &str = "public.tenants";

/// Tenant directory over the control-plane Postgres table.
#[derive(Debug, Clone)]
pub struct PostgresTenantDirectory {
    pool: PgPool,
    table: String,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: DEFAULT_TENANT_TABLE.to_string(),
        }
    }

    /// Read from `table` (`schema.table` or `table`) instead of the default.
    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self, DirectoryError> {
        let table = table.into();
        if !is_plain_qualified_name(&table) {
            return Err(DirectoryError::InvalidTable(table));
        }
        self.table = table;
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn list_query(&self) -> String {
        format!(
            r#"
            SELECT id, name, subdomain, schema_name, status::text AS status, settings, created_at
            FROM {}
            WHERE lower(status::text) = 'active'
            ORDER BY created_at ASC, id ASC
            "#,
            self.table
        )
    }
}

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    #[instrument(
        skip(self),
        fields(table = %self.table, tenant_count = tracing::field::Empty),
        err
    )]
    async fn list_active(&self) -> Result<Vec<Tenant>, DirectoryError> {
        let sql = self.list_query();
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        let mut tenants = rows
            .iter()
            .map(tenant_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        // The SQL ordering already matches; re-sort so every directory
        // implementation agrees on ties.
        sort_for_execution(&mut tenants);

        Span::current().record("tenant_count", tenants.len());
        Ok(tenants)
    }
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, DirectoryError> {
    let decode = |e: sqlx::Error| DirectoryError::Unavailable(format!("malformed tenant row: {e}"));

    let status: String = row.try_get("status").map_err(decode)?;
    let status: TenantStatus = status
        .parse()
        .map_err(|e| DirectoryError::Unavailable(format!("malformed tenant row: {e}")))?;
    let settings: Option<serde_json::Value> = row.try_get("settings").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    Ok(Tenant {
        id: TenantId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        subdomain: row.try_get("subdomain").map_err(decode)?,
        schema_name: row.try_get("schema_name").map_err(decode)?,
        status,
        settings: settings.unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        created_at,
    })
}
