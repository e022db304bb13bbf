//! Structured logging setup.
//!
//! Uses `tracing` with a `tracing-subscriber` fmt layer. The filter comes
//! from `RUST_LOG`, falling back to `info` for this crate and the HTTP
//! trace layer. Output goes to stderr so CLI commands keep stdout for JSON.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Installs the global subscriber. Later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();

    if result.is_ok() {
        tracing::debug!("tracing initialized");
    }
}
