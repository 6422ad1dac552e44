// Logging setup for the binary; library code only emits `tracing` events.
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Maps the number of `-v` flags to the level used for this crate's events.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
/// Output goes to stderr so it never interleaves with conversion results on stdout.
pub fn init_logging(verbosity: u8) {
    let level = level_for(verbosity);
    let app_filter = Targets::new().with_target("xconv", level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(app_filter)
        .with(env_filter)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
