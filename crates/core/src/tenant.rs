//! Control-plane tenant model.
//!
//! A tenant is one isolated customer environment. Its data lives in a
//! dedicated Postgres schema (`schema_name`); requests are routed to it by
//! `subdomain`. Tenants are created and administered elsewhere; everything in
//! this workspace treats them as read-only.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::TenantId;

/// Lifecycle status of a tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "deleted" => Ok(TenantStatus::Deleted),
            other => Err(DomainError::validation(format!(
                "unknown tenant status: {other}"
            ))),
        }
    }
}

/// One isolated customer environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Display name.
    pub name: String,
    /// Routing key.
    pub subdomain: String,
    /// Physical isolation unit (Postgres schema).
    pub schema_name: String,
    pub status: TenantStatus,
    /// Free-form settings blob.
    #[serde(default)]
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Build an active tenant with empty settings, created now.
    pub fn new(
        name: impl Into<String>,
        subdomain: impl Into<String>,
        schema_name: impl Into<String>,
    ) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            subdomain: subdomain.into(),
            schema_name: schema_name.into(),
            status: TenantStatus::Active,
            settings: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    /// Only active tenants are eligible for background jobs.
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}
