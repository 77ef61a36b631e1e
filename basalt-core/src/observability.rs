/*!
Observability infrastructure for the basalt control plane.

This module provides structured logging/tracing setup and, behind the
`metrics` feature, Prometheus instrumentation for driver dispatches and
compare-and-set conflicts.
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
#[cfg(feature = "metrics")]
use std::time::Instant;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{BasaltError, Result};

/// Global metrics instance
#[cfg(feature = "metrics")]
static METRICS: OnceLock<BasaltMetrics> = OnceLock::new();

/// Metrics collection for coordinator and driver operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct BasaltMetrics {
    /// Backend driver operations dispatched
    pub driver_dispatches_total: Counter,
    /// Backend driver operations that reported failure
    pub driver_failures_total: Counter,
    /// Duration of backend driver operations in seconds
    pub driver_latency_seconds: Histogram,
    /// Driver completions dropped because the record moved on
    pub stale_completions_total: Counter,

    // Prometheus registry for scraping
    registry: Registry,
}

#[cfg(feature = "metrics")]
impl BasaltMetrics {
    /// Initialize new metrics instance
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let driver_dispatches_total = Counter::new(
            "basalt_driver_dispatches_total",
            "Total backend driver operations dispatched",
        )
        .map_err(|e| {
            BasaltError::store(format!(
                "Failed to create driver_dispatches_total metric: {e}"
            ))
        })?;

        let driver_failures_total = Counter::new(
            "basalt_driver_failures_total",
            "Total backend driver operations that failed",
        )
        .map_err(|e| {
            BasaltError::store(format!(
                "Failed to create driver_failures_total metric: {e}"
            ))
        })?;

        let driver_latency_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "basalt_driver_latency_seconds",
            "Duration of backend driver operations in seconds",
        ))
        .map_err(|e| {
            BasaltError::store(format!(
                "Failed to create driver_latency_seconds metric: {e}"
            ))
        })?;

        let stale_completions_total = Counter::new(
            "basalt_stale_completions_total",
            "Driver completions dropped because the record state moved on",
        )
        .map_err(|e| {
            BasaltError::store(format!(
                "Failed to create stale_completions_total metric: {e}"
            ))
        })?;

        registry
            .register(Box::new(driver_dispatches_total.clone()))
            .map_err(|e| {
                BasaltError::store(format!("Failed to register driver_dispatches_total: {e}"))
            })?;

        registry
            .register(Box::new(driver_failures_total.clone()))
            .map_err(|e| {
                BasaltError::store(format!("Failed to register driver_failures_total: {e}"))
            })?;

        registry
            .register(Box::new(driver_latency_seconds.clone()))
            .map_err(|e| {
                BasaltError::store(format!("Failed to register driver_latency_seconds: {e}"))
            })?;

        registry
            .register(Box::new(stale_completions_total.clone()))
            .map_err(|e| {
                BasaltError::store(format!("Failed to register stale_completions_total: {e}"))
            })?;

        Ok(Self {
            driver_dispatches_total,
            driver_failures_total,
            driver_latency_seconds,
            stale_completions_total,
            registry,
        })
    }

    /// Get or initialize the global metrics instance
    pub fn global() -> &'static BasaltMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize basalt metrics"))
    }

    /// Record a driver dispatch
    pub fn record_dispatch(&self, _operation: &str) {
        self.driver_dispatches_total.inc();
    }

    /// Record a driver failure
    pub fn record_failure(&self, _operation: &str) {
        self.driver_failures_total.inc();
    }

    /// Record driver operation latency
    pub fn record_latency(&self, _operation: &str, duration: std::time::Duration) {
        self.driver_latency_seconds.observe(duration.as_secs_f64());
    }

    /// Record a dropped stale completion
    pub fn record_stale_completion(&self) {
        self.stale_completions_total.inc();
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| BasaltError::store(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| BasaltError::store(format!("Failed to convert metrics to string: {e}")))
    }
}

/// Metrics timer for measuring driver operation durations
#[cfg(feature = "metrics")]
pub struct MetricsTimer {
    start: Instant,
    operation: &'static str,
}

#[cfg(feature = "metrics")]
impl MetricsTimer {
    /// Start a new timer for the given driver operation
    pub fn start(operation: &'static str) -> Self {
        BasaltMetrics::global().record_dispatch(operation);

        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Complete the timer, recording success latency
    pub fn finish(self) {
        let duration = self.start.elapsed();
        BasaltMetrics::global().record_latency(self.operation, duration);
    }

    /// Complete the timer with an error, recording both latency and failure
    pub fn finish_with_error(self) {
        let duration = self.start.elapsed();
        BasaltMetrics::global().record_latency(self.operation, duration);
        BasaltMetrics::global().record_failure(self.operation);
    }
}

/// Initialize the global observability system
///
/// Sets up a tracing subscriber with JSON formatting and an environment
/// filter defaulting to `basalt=info`, and warms up the metrics registry
/// when the `metrics` feature is enabled.
///
/// # Returns
/// Result indicating success or failure of initialization; fails if a
/// global subscriber is already installed.
pub fn init_observability() -> Result<()> {
    #[cfg(feature = "metrics")]
    BasaltMetrics::global();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(false);

    let subscriber = TracingRegistry::default()
        .with(EnvFilter::from_default_env().add_directive(
            "basalt=info".parse().map_err(|e| {
                BasaltError::validation(format!("invalid default log directive: {e}"))
            })?,
        ))
        .with(fmt_layer);

    set_global_default(subscriber).map_err(|e| {
        BasaltError::validation(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::info!("basalt observability initialized");
    Ok(())
}
