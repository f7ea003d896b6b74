//! JSON log output filtered through `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; returns `false` if one was already set.
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(true)
        .with_target(false)
        .try_init()
        .is_ok()
}
