//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::{LogFormat, TracingConfig};

/// Initialize tracing from the environment (`RUST_LOG`, `STUDYFORGE_LOG_FORMAT`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(&TracingConfig::from_env());
}
