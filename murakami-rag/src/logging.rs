use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so the console
/// transcript on stdout stays readable.
///
/// `level` (from `--log-level`) wins over `RUST_LOG`; with neither, `info`.
pub fn init(level: Option<&str>) {
    let filter = level
        .and_then(|l| EnvFilter::try_new(l).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
