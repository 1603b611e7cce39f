use crate::config::MetricsConfig;
use metrics_exporter_statsd::StatsdBuilder;
use ping_relay::metrics_defs::ALL_METRICS;
use shared::metrics_defs::describe_metrics;

const METRICS_PREFIX: &str = "ping_relay";

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("could not build statsd exporter: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Installs the statsd recorder. Without one, every metric is a no-op.
pub fn init(config: &MetricsConfig) -> Result<(), MetricsError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))?;

    metrics::set_global_recorder(recorder).map_err(|_| MetricsError::AlreadyInstalled)?;
    describe_metrics(ALL_METRICS);

    tracing::info!(
        "Sending metrics to statsd at {}:{}",
        config.statsd_host,
        config.statsd_port
    );
    Ok(())
}
