//! Telemetry module
//!
//! Logging and metrics

mod logging;
mod metrics;

pub use self::logging::{init_logging, LogFormat};
pub use self::metrics::{
    record_gateway_retry, record_order_latency, record_rejection, record_trade_closed, set_gauge,
    GaugeMetric,
};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Guard that keeps telemetry alive for the life of the process
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize logging and, when a port is configured, the Prometheus exporter.
/// The exporter spawns onto the current tokio runtime.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        tracing::info!(port, "Prometheus exporter listening");
    }

    Ok(TelemetryGuard { _priv: () })
}
