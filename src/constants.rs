// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Prometheus config controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Scrape Job Constants
// ============================================================================

/// Prefix of every scrape job owned by this controller
pub const MANAGED_JOB_PREFIX: &str = "guest-cluster-";

/// Key of the scrape config list inside a Prometheus configuration document
pub const SCRAPE_CONFIGS_KEY: &str = "scrape_configs";

/// Key holding the job name of a scrape config entry
pub const JOB_NAME_KEY: &str = "job_name";

/// File extension of materialized certificate files
pub const CERTIFICATE_FILE_EXTENSION: &str = "pem";

// ============================================================================
// Prometheus HTTP API Constants
// ============================================================================

/// Path of the Prometheus endpoint reporting the loaded configuration
pub const PROMETHEUS_CONFIG_PATH: &str = "/api/v1/status/config";

/// Path of the Prometheus hot-reload endpoint
pub const PROMETHEUS_RELOAD_PATH: &str = "/-/reload";

/// Value of the `status` field in successful Prometheus API responses
pub const PROMETHEUS_STATUS_SUCCESS: &str = "success";

/// Timeout for every HTTP call to Prometheus
pub const PROMETHEUS_HTTP_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Default Flag Values
// ============================================================================

/// Default Prometheus base URL
pub const DEFAULT_PROMETHEUS_ADDRESS: &str = "http://127.0.0.1:9090";

/// Default number of in-place retries for a failing resource step
pub const DEFAULT_RESOURCE_RETRIES: usize = 3;

/// Default `clusterComponent` label value of certificate secrets
pub const DEFAULT_CERTIFICATE_COMPONENT_NAME: &str = "prometheus";

/// Default directory certificate files are written to
pub const DEFAULT_CERTIFICATE_DIRECTORY: &str = "/certs";

/// Default namespace certificate secrets are read from
pub const DEFAULT_CERTIFICATE_NAMESPACE: &str = "default";

/// Default file mode of certificate files (octal)
pub const DEFAULT_CERTIFICATE_PERMISSION: &str = "0600";

/// Default ConfigMap data key holding the Prometheus configuration
pub const DEFAULT_CONFIGMAP_KEY: &str = "prometheus.yml";

/// Default name of the Prometheus ConfigMap
pub const DEFAULT_CONFIGMAP_NAME: &str = "prometheus";

/// Default namespace of the Prometheus ConfigMap
pub const DEFAULT_CONFIGMAP_NAMESPACE: &str = "monitoring";

/// Default period of the artificial resync tick (1 minute)
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 60;

/// Default minimum interval between two Prometheus reloads (2 minutes)
pub const DEFAULT_MINIMUM_RELOAD_TIME_SECS: u64 = 120;

/// Default bind address of the health/metrics HTTP server
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8000";

// ============================================================================
// Controller Constants
// ============================================================================

/// Number of events a reconciliation loop processes concurrently
pub const RECONCILE_WORKERS: usize = 4;

/// Name of the certificate → configmap reconciliation loop
pub const MAIN_LOOP: &str = "main";

/// Name of the reload-only reconciliation loop
pub const RELOAD_LOOP: &str = "reload";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// HTTP Server Constants
// ============================================================================

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTHZ_SERVER_PATH: &str = "/healthz";

/// Path for the version endpoint
pub const VERSION_SERVER_PATH: &str = "/version";
