//! Logging bootstrap: a `tracing-subscriber` `fmt` layer driven by
//! `RUST_LOG`, falling back to `info` when unset. Mirrors the logging setup
//! `keithbugeja-liminal`'s binaries run at startup.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. Safe to call more than once -
/// later calls are no-ops, matching `tracing_subscriber`'s own guard against
/// double-init.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
