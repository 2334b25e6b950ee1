//! Process-wide tracing initialization.
//!
//! Library code never calls this; it exists for binaries and tests to call
//! once at startup, mirroring the init-before-any-component lifecycle
//! convention for the rare case a platform wants a process-wide logger.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` fmt layer reading `RUST_LOG`
/// (defaulting to `info`). Safe to call more than once; later calls are
/// no-ops if a global subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(true)
        .try_init();
}
