//! Logging initialisation.
//!
//! The library only emits `tracing` events; hosts decide whether to
//! install a subscriber. These helpers install the usual `fmt`
//! subscriber with an `EnvFilter`.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs a global `fmt` subscriber.
///
/// The filter is read from `RUST_LOG` and defaults to `info`,
/// e.g. `RUST_LOG=line_sequencer=debug`. Does nothing if a global
/// subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .try_init();
}

/// Installs a `debug` subscriber that writes through the test harness.
///
/// Safe to call from every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
