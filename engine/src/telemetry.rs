//! Structured logging setup
//!
//! One `tracing-subscriber` registry for the whole process. The filter is
//! driven by the configured log level unless `RUST_LOG` overrides it; output
//! is pretty-printed in debug builds and JSON in release builds.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `log_level` is normally the configured `core.log_level` (or its CLI
/// override); `None` falls back to "info". A `RUST_LOG` env var takes
/// priority over both. Safe to call more than once; only the first call
/// installs a subscriber.
pub fn init_telemetry(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},moustachar_engine={level}")));

    #[cfg(debug_assertions)]
    let format_layer = fmt::layer().pretty().with_target(false);
    #[cfg(not(debug_assertions))]
    let format_layer = fmt::layer().json().with_current_span(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(format_layer)
        .try_init()
        .ok();
}
