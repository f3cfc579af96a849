use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `WABOT_LOG` wins over `RUST_LOG`.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(default_level: &str) {
    let default_filter = format!("{default_level},wabot={default_level}");

    let filter = std::env::var("WABOT_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init();
}
