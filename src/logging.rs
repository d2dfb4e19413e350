//! Console logging for backup runs.
//!
//! Runs are typically driven by cron, so the progress log on stderr *is* the
//! operator-facing record of what happened. Output is compact single-line
//! events with timestamps; verbosity is controlled via `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` if unset, which covers every
/// planning and pruning decision. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=pgrotate=debug pgrotate run
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
