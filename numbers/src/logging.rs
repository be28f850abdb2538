use crate::config::{LoggingConfig, default_log_level};
use sentry::types::{Dsn, ParseDsnError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the process-wide tracing subscriber.
///
/// When a Sentry DSN is configured, error events are also reported to Sentry;
/// the returned guard flushes pending events when dropped.
pub fn init(
    config: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, ParseDsnError> {
    let dsn = config
        .and_then(|c| c.sentry_dsn.as_deref())
        .map(str::parse::<Dsn>)
        .transpose()?;

    let level = config.map_or_else(default_log_level, |c| c.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let guard = dsn.map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            ..Default::default()
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    Ok(guard)
}
