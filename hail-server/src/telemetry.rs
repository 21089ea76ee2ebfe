//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging.
///
/// `RUST_LOG` controls the filter; defaults to `info` for the workspace.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
