//! Log output for tests.

use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test harness.
///
/// The filter comes from `RUST_LOG`, defaulting to `debug` for replisync
/// crates. Safe to call from every test; only the first call installs the
/// subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("replisync_store=debug,replisync_engine=debug")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
