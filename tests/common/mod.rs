use tracing_subscriber::EnvFilter;

/// Routes watcher logs to the test output. Set `RUST_LOG=tmap=trace` to see them.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
