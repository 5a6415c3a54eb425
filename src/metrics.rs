// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics of the controller.
//!
//! Metrics are registered in a process-wide registry with the namespace prefix
//! `prometheus_config_controller_` and exposed on the `/metrics` endpoint.
//! Components never touch the statics directly: they receive an
//! `Arc<dyn Telemetry>` and record by metric name, which keeps them testable with a
//! recording fake.
//!
//! # Metrics
//!
//! - `reconciliations_total{loop,status}` and `reconciliation_duration_seconds{loop}`
//! - `resource_errors_total{resource,kind}`
//! - `reloads_total{result}`
//! - `scrape_configs_generated`
//! - `certificate_files_written_total` and `certificate_files_removed_total`
//!
//! # Example
//!
//! ```rust,no_run
//! use prometheus_config_controller::metrics::{PrometheusTelemetry, Telemetry, RELOADS};
//!
//! let telemetry = PrometheusTelemetry;
//! telemetry.inc(RELOADS, &["success"]);
//! ```

use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use tracing::{debug, warn};

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "prometheus_config_controller";

/// Reconciliations by loop and status
pub const RECONCILIATIONS: &str = "reconciliations_total";

/// Reconciliation duration by loop
pub const RECONCILIATION_DURATION: &str = "reconciliation_duration_seconds";

/// Resource step errors by resource and error kind
pub const RESOURCE_ERRORS: &str = "resource_errors_total";

/// Reload decisions by result
pub const RELOADS: &str = "reloads_total";

/// Number of scrape configs produced per build
pub const SCRAPE_CONFIGS_GENERATED: &str = "scrape_configs_generated";

/// Certificate files written to disk
pub const CERTIFICATE_FILES_WRITTEN: &str = "certificate_files_written_total";

/// Certificate files removed from disk
pub const CERTIFICATE_FILES_REMOVED: &str = "certificate_files_removed_total";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register<M>(metric: M) -> M
where
    M: prometheus::core::Collector + Clone + 'static,
{
    METRICS_REGISTRY
        .register(Box::new(metric.clone()))
        .expect("metric registered once");
    metric
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help)
}

/// Total number of reconciliations by loop and status
///
/// Labels:
/// - `loop`: `main` or `reload`
/// - `status`: `success`, `requeue`, `error` or `cancelled`
pub static RECONCILIATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register(
        CounterVec::new(
            opts(RECONCILIATIONS, "Total number of reconciliations by loop and status"),
            &["loop", "status"],
        )
        .expect("valid metric definition"),
    )
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_{RECONCILIATION_DURATION}"),
        "Duration of reconciliations in seconds by loop",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    register(HistogramVec::new(opts, &["loop"]).expect("valid metric definition"))
});

/// Total number of failed resource steps
///
/// Labels:
/// - `resource`: `certificate`, `configmap` or `reload`
/// - `kind`: error kind, e.g. `config_map_not_found`
pub static RESOURCE_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register(
        CounterVec::new(
            opts(RESOURCE_ERRORS, "Total number of failed resource steps by kind"),
            &["resource", "kind"],
        )
        .expect("valid metric definition"),
    )
});

/// Total number of reload decisions
///
/// Labels:
/// - `result`: `success`, `throttled`, `unchanged` or `failed`
pub static RELOADS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register(
        CounterVec::new(
            opts(RELOADS, "Total number of Prometheus reload decisions by result"),
            &["result"],
        )
        .expect("valid metric definition"),
    )
});

/// Number of scrape configs generated per build
pub static SCRAPE_CONFIGS_GENERATED_HISTOGRAM: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_{SCRAPE_CONFIGS_GENERATED}"),
        "Number of scrape configs generated per build",
    )
    .buckets(vec![0.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0]);
    register(Histogram::with_opts(opts).expect("valid metric definition"))
});

/// Total number of certificate files written
pub static CERTIFICATE_FILES_WRITTEN_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register(
        Counter::with_opts(opts(
            CERTIFICATE_FILES_WRITTEN,
            "Total number of certificate files written",
        ))
        .expect("valid metric definition"),
    )
});

/// Total number of certificate files removed
pub static CERTIFICATE_FILES_REMOVED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register(
        Counter::with_opts(opts(
            CERTIFICATE_FILES_REMOVED,
            "Total number of certificate files removed",
        ))
        .expect("valid metric definition"),
    )
});

// ============================================================================
// Telemetry
// ============================================================================

/// Narrow recording interface handed to components.
pub trait Telemetry: Send + Sync {
    /// Increment counter `name` for the given label values.
    fn inc(&self, name: &str, labels: &[&str]);

    /// Record `value` on histogram `name` for the given label values.
    fn observe(&self, name: &str, labels: &[&str], value: f64);
}

/// [`Telemetry`] backed by the global registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusTelemetry;

impl Telemetry for PrometheusTelemetry {
    fn inc(&self, name: &str, labels: &[&str]) {
        let vec = match name {
            RECONCILIATIONS => &*RECONCILIATIONS_TOTAL,
            RESOURCE_ERRORS => &*RESOURCE_ERRORS_TOTAL,
            RELOADS => &*RELOADS_TOTAL,
            CERTIFICATE_FILES_WRITTEN => return CERTIFICATE_FILES_WRITTEN_TOTAL.inc(),
            CERTIFICATE_FILES_REMOVED => return CERTIFICATE_FILES_REMOVED_TOTAL.inc(),
            _ => {
                debug!(metric = name, "Ignoring unknown counter");
                return;
            }
        };

        match vec.get_metric_with_label_values(labels) {
            Ok(counter) => counter.inc(),
            Err(e) => warn!(metric = name, error = %e, "Failed to record counter"),
        }
    }

    fn observe(&self, name: &str, labels: &[&str], value: f64) {
        let vec = match name {
            RECONCILIATION_DURATION => &*RECONCILIATION_DURATION_SECONDS,
            SCRAPE_CONFIGS_GENERATED => return SCRAPE_CONFIGS_GENERATED_HISTOGRAM.observe(value),
            _ => {
                debug!(metric = name, "Ignoring unknown histogram");
                return;
            }
        };

        match vec.get_metric_with_label_values(labels) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => warn!(metric = name, error = %e, "Failed to record histogram"),
        }
    }
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
