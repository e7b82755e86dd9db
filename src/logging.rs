//! Tracing subscriber setup for applications embedding saga reducers.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `settings.filter`. Returns `false` if
/// a global subscriber was already installed.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init()
        .is_ok()
}
