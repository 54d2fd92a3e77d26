use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Filter comes from
/// `DESKBRIDGE_LOG` (standard `EnvFilter` syntax), defaulting to `info`.
pub fn init() {
    let filter =
        EnvFilter::try_from_env("DESKBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
