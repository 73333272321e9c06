//! Diagnostic tracing for the crew binary.
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG`, written to stderr.
//!   Not persisted.
//! - **Run logs (`io/run_log`)**: product artifacts in `<output>/.crew/runs/`.
//!   Always written, unaffected by `RUST_LOG`.
//! - **Progress**: `CrewEvent`s printed to stdout by the CLI.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`, or `crew=debug` with `--verbose`.
///
/// # Example
/// ```bash
/// RUST_LOG=crew=trace crew build --requirements "A todo CLI"
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "warn,crew=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
