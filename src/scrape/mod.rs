// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus scrape configuration generation.
//!
//! This module turns the set of guest cluster master services into Prometheus
//! `scrape_config` entries and splices them into an existing Prometheus
//! configuration document.
//!
//! # Modules
//!
//! - [`types`] - Serde model of scrape configs
//! - [`relabel`] - Relabel and metric-relabel chains per job kind
//! - [`builder`] - `(services, cert_dir) → scrape configs`
//! - [`merge`] - `(prometheus config, scrape configs) → prometheus config`
//!
//! # Example
//!
//! ```rust
//! use prometheus_config_controller::scrape::{build_scrape_configs, merge, PrometheusConfig};
//! use std::path::Path;
//!
//! let config = PrometheusConfig::from_yaml("scrape_configs: []\n").unwrap();
//! let generated = build_scrape_configs(&[], Path::new("/certs"));
//! let merged = merge(&config, &generated).unwrap();
//! assert!(merged.job_names().is_empty());
//! ```

pub mod builder;
pub mod merge;
pub mod relabel;
pub mod types;

pub use builder::{build_scrape_configs, JobKind};
pub use merge::{merge, PrometheusConfig};
pub use types::{
    KubernetesSdConfig, RelabelAction, RelabelConfig, Scheme, ScrapeConfig, SdRole, StaticConfig,
    TlsConfig,
};
