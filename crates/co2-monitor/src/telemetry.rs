//! Logging and Metrics Setup

use crate::settings::LogConfig;
use anyhow::anyhow;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// Initialize logging.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow!("invalid log level {:?}: {}", config.level, e))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow!("failed to set tracing subscriber: {}", e))
}

/// Install the Prometheus recorder backing the `metrics` macros
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow!("failed to install metrics recorder: {}", e))?;

    metrics::describe_counter!("co2_readings_total", "Valid sensor readings published");
    metrics::describe_counter!("co2_readings_dropped_total", "Malformed or out-of-range sensor lines");
    metrics::describe_counter!("co2_readings_unobserved_total", "Readings published with no subscriber");
    metrics::describe_gauge!("co2_last_reading_ppm", "Most recent CO2 reading");
    metrics::describe_counter!("co2_alerts_sent_total", "Alerts delivered, by level");
    metrics::describe_counter!("co2_alerts_failed_total", "Alert deliveries that failed");
    metrics::describe_gauge!("co2_active_subscribers", "Users currently subscribed");

    Ok(handle)
}
