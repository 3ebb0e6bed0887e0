//! Tracing subscriber setup for applications embedding the client.

use crate::config::EnvVars;
use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber.
///
/// `CIVIS_LOG` takes precedence over the `debug` flag when set (standard
/// `EnvFilter` directives, e.g. `civis_core=debug,reqwest=warn`). Calling this
/// twice is harmless; the second install is ignored.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(EnvVars::LOG).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .try_init();
}

/// Same as [`init_logging`] but emits JSON lines, for log shippers.
pub fn init_json_logging() {
    let filter = EnvFilter::try_from_env(EnvVars::LOG).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
}
