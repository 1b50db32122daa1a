//! Shared helpers for integration tests

use tracing_subscriber::EnvFilter;

/// Routes the crate's tracing events to the test harness output.
/// `RUST_LOG` overrides the default `danci_srs=debug` filter.
pub fn init_test_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("danci_srs=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
