//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

/// Initialise the global `tracing` subscriber.
///
/// Filter resolution order: `RUST_LOG`, then `LOG_LEVEL` (e.g. `debug`), then `info`.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("LOG_LEVEL")
                .map_err(|_| ())
                .and_then(|level| EnvFilter::try_new(level.to_lowercase()).map_err(|_| ()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
