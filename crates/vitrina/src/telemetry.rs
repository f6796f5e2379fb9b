//! Tracing bootstrap for test binaries and consumers.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG`, defaulting to `info`.
/// Safe to call repeatedly; only the first call wins.
pub fn init() {
    init_with_default("info");
}

/// Install a fmt subscriber with an explicit default filter
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
