//! Tracing setup for the CLI and the server.
//!
//! Diagnostics go to stderr so stdout stays reserved for progress reports.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; falls back to `default_level` (e.g. `warn`) if unset or
/// invalid. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=agent=debug agent run "count the files in /tmp"
/// ```
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
