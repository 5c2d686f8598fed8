//! Tracing initialization for the binary

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. Honors `RUST_LOG`, defaulting to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}
