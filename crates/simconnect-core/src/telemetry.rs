//! Logging bootstrap for applications built on this crate.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the application installs a subscriber.  [`init_tracing`] installs the usual
//! one: formatted output filtered by `RUST_LOG`, falling back to the level
//! from [`SessionConfig::log_level`](crate::config::SessionConfig::log_level).

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed (for
/// example by a test harness); the existing one stays in place.
pub fn init_tracing(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
