//! Tracing/logging setup shared by the ForgeERP binaries.

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize process-wide logging, format chosen from `FORGEERP_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}
