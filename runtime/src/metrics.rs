//! Prometheus metrics for the report lifecycle and the emission pipeline.
//!
//! Metric names:
//!
//! | Name | Kind | Labels |
//! |---|---|---|
//! | `reports_created_total` | counter | |
//! | `report_status_changes_total` | counter | `from`, `to` |
//! | `report_events_emitted_total` | counter | `topic` |
//! | `report_events_failed_total` | counter | `topic`, `reason` |
//! | `report_event_emit_duration_seconds` | histogram | `topic` |
//! | `report_events_dead_lettered_total` | counter | `topic`, `cause` |
//! | `report_dead_letters_evicted_total` | counter | |
//! | `report_event_queue_dropped_total` | counter | `reason` |
//! | `report_event_queue_depth` | gauge | |
//! | `report_dead_letters` | gauge | |
//! | `report_store_errors_total` | counter | `operation` |
//!
//! # Example
//!
//! ```rust,no_run
//! use reportdesk_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use reportdesk_core::ReportStatus;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address it should be served on.
///
/// The recorder is installed globally by [`start`](Self::start); serving
/// [`render`](Self::render) over HTTP is left to the caller.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe every metric and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. An already
    /// installed recorder (tests) is tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!("reports_created_total", "Reports successfully created");
    describe_counter!(
        "report_status_changes_total",
        "Status changes persisted, labelled by from/to status"
    );

    describe_counter!(
        "report_events_emitted_total",
        "Domain events delivered to the message bus"
    );
    describe_counter!(
        "report_events_failed_total",
        "Failed emission attempts, labelled by reason"
    );
    describe_histogram!(
        "report_event_emit_duration_seconds",
        "Time taken by a single emission attempt"
    );
    describe_counter!(
        "report_events_dead_lettered_total",
        "Events dead-lettered, labelled by cause"
    );
    describe_counter!(
        "report_dead_letters_evicted_total",
        "Dead letters evicted because the buffer was full"
    );
    describe_counter!(
        "report_event_queue_dropped_total",
        "Events dropped before reaching the emitter worker"
    );
    describe_gauge!("report_event_queue_depth", "Events waiting in the emitter queue");
    describe_gauge!("report_dead_letters", "Events currently held in the dead-letter buffer");

    describe_counter!(
        "report_store_errors_total",
        "Database errors raised by the report store, labelled by operation"
    );

    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!("retry_successes_total", "Operations that succeeded after a retry");
    describe_counter!("retry_exhausted_total", "Operations that exhausted their retries");
}

/// Lifecycle metrics recorder.
pub struct ReportMetrics;

impl ReportMetrics {
    /// Record a created report.
    pub fn record_created() {
        counter!("reports_created_total").increment(1);
    }

    /// Record a persisted status change.
    pub fn record_status_change(from: ReportStatus, to: ReportStatus) {
        counter!("report_status_changes_total", "from" => from.as_str(), "to" => to.as_str())
            .increment(1);
    }
}

/// Emission pipeline metrics recorder.
pub struct EmitterMetrics;

impl EmitterMetrics {
    /// Record a delivered event.
    pub fn record_emitted(topic: &str, duration: Duration) {
        counter!("report_events_emitted_total", "topic" => topic.to_string()).increment(1);
        histogram!("report_event_emit_duration_seconds", "topic" => topic.to_string())
            .record(duration.as_secs_f64());
    }

    /// Record a failed emission attempt.
    pub fn record_failure(topic: &str, reason: &'static str) {
        counter!("report_events_failed_total", "topic" => topic.to_string(), "reason" => reason)
            .increment(1);
    }

    /// Record a dead-lettered event.
    pub fn record_dead_lettered(topic: &str, cause: &'static str) {
        counter!(
            "report_events_dead_lettered_total",
            "topic" => topic.to_string(),
            "cause" => cause
        )
        .increment(1);
    }

    /// Record a dead letter evicted to make room.
    pub fn record_dead_letter_evicted() {
        counter!("report_dead_letters_evicted_total").increment(1);
    }

    /// Record an event dropped at submission.
    pub fn record_dropped(reason: &'static str) {
        counter!("report_event_queue_dropped_total", "reason" => reason).increment(1);
    }

    /// Record the current queue depth.
    #[allow(clippy::cast_precision_loss)] // queue depth is bounded by capacity
    pub fn record_queue_depth(depth: usize) {
        gauge!("report_event_queue_depth").set(depth as f64);
    }

    /// Record the current dead-letter buffer size.
    #[allow(clippy::cast_precision_loss)] // bounded by buffer capacity
    pub fn record_dead_letters(size: usize) {
        gauge!("report_dead_letters").set(size as f64);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}
