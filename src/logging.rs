use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "storyedit=info";

/// Installs the global `tracing` subscriber. Filtering follows `RUST_LOG`,
/// falling back to `storyedit=info`. Later calls are no-ops.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init();
}
