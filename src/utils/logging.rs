//! Logging initialization
//!
//! Respects the `RUST_LOG` environment variable, falls back to the filter
//! the bootstrap passes in, and defaults to "info".

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize engine logging
///
/// `RUST_LOG` takes precedence over `filter`; with neither set the level
/// defaults to "info". Safe to call once per process.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter.unwrap_or("info"))
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
