use tracing_subscriber::EnvFilter;

/// `RUST_LOG` overrides the default `info` level; `json` switches to JSON lines.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    // A second init (tests, embedding) is not an error worth surfacing.
    if log_format.eq_ignore_ascii_case("json") {
        let _ = builder.json().with_current_span(false).try_init();
    } else {
        let _ = builder.try_init();
    }
}
