use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
///
/// When a sentry DSN is configured, the returned guard must be kept alive
/// for events to be flushed.
pub fn init(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = config.and_then(|c| c.sentry_dsn.as_deref()).map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).compact())
        .with(sentry_layer)
        .init();

    guard
}
