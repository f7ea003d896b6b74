//! Process-wide logging setup shared by the authkit binaries.

/// Initialize tracing for the process.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(DEFAULT_FILTER);
}

/// Directive used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Subscriber construction (filters, formatting).
pub mod tracing;
