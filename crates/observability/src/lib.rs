//! # Observability
//!
//! Tracing and Prometheus metrics for the scene streamer.
//!
//! ## Features
//!
//! - Tracing initialisation (JSON / pretty / compact, `RUST_LOG` aware)
//! - Optional Prometheus exporter
//! - Per-tick metrics and an in-memory run summary
//!
//! ## Usage Example
//!
//! ```ignore
//! use observability::{init_with_config, ObservabilityConfig, TickMetricsAggregator};
//!
//! init_with_config(ObservabilityConfig::from(&config.observability))?;
//!
//! let mut aggregator = TickMetricsAggregator::new();
//! let record = report.to_record();
//! observability::record_tick(&record);
//! aggregator.update(&record);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use contracts::{LogFormat, ObservabilitySettings};

pub use crate::metrics::{
    record_encode_failure, record_message_published, record_scene_load_failure,
    record_scene_loaded, record_tick, MetricsSummary, RunningStats, StatsSummary,
    TickMetricsAggregator, TickRecord,
};

/// Initialise with defaults (pretty logs, no exporter)
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::from(&ObservabilitySettings::default())
    }
}

impl From<&ObservabilitySettings> for ObservabilityConfig {
    fn from(settings: &ObservabilitySettings) -> Self {
        Self {
            log_format: settings.log_format,
            metrics_port: settings.metrics_port,
            default_log_level: settings.log_level.clone(),
        }
    }
}

/// Install the log subscriber and, when a port is set, the Prometheus exporter.
///
/// `RUST_LOG` overrides `default_log_level`. Fails if a global subscriber is
/// already installed.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    // exactly one of these is Some
    let (json, pretty, compact) = match config.log_format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
            None,
        ),
        LogFormat::Pretty => (None, Some(fmt::layer().pretty()), None),
        LogFormat::Compact => (None, None, Some(fmt::layer().compact())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .with(compact)
        .try_init()
        .context("log subscriber already installed")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "logging ready"
    );

    Ok(())
}

/// Install only the Prometheus recorder (tracing set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("binding metrics exporter on port {port}"))?;

    tracing::info!(port, "serving /metrics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.default_log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_from_settings() {
        let settings = ObservabilitySettings {
            log_format: LogFormat::Json,
            log_level: "debug".to_string(),
            metrics_port: Some(9000),
        };
        let config = ObservabilityConfig::from(&settings);
        assert_eq!(config.metrics_port, Some(9000));
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
