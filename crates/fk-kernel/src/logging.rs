//! Subscriber setup for binaries and tests.  Library crates only emit
//! `tracing` events; installing a subscriber is the application's call.

use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"info,fk_scheduler=debug"`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
