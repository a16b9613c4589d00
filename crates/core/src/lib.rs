//! `forgeerp-core`: shared domain types for tenants and ids.
//!
//! Tenant identity and the control-plane tenant model shared by the job
//! runner and its adapters. No infrastructure concerns live here.

pub mod error;
pub mod id;
pub mod tenant;

pub use error::DomainError;
pub use id::TenantId;
pub use tenant::{Tenant, TenantStatus};
