// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Prometheus Config Controller
//!
//! A Kubernetes controller that keeps the scrape configuration of a running Prometheus
//! server in sync with the guest clusters represented by master services in the host
//! cluster.
//!
//! ## Overview
//!
//! On every trigger the controller:
//!
//! 1. Discovers master services annotated with `giantswarm.io/prometheus-cluster`
//! 2. Writes the TLS material of each guest cluster to the certificate directory
//! 3. Rewrites the managed `guest-cluster-*` jobs of the Prometheus ConfigMap, leaving
//!    every other job untouched
//! 4. Asks Prometheus to reload, at most once per minimum reload interval
//!
//! ## Modules
//!
//! - [`scrape`] - Scrape config generation and merging
//! - [`resources`] - Certificate, ConfigMap and reload resources
//! - [`reconciler`] - Ordered execution of resource steps
//! - [`controller`] - Worker loop with requeue and backoff
//! - [`informer`] - Tick, service and ConfigMap triggers
//! - [`reloader`] - Rate-limited Prometheus reloads
//! - [`kubernetes`] - Kubernetes API access
//! - [`config`] - Command line flags
//!
//! ## Example
//!
//! ```rust
//! use prometheus_config_controller::key::{ca_path, job_name};
//! use std::path::Path;
//!
//! assert_eq!(job_name("xa5ly", "kubelet"), "guest-cluster-xa5ly-kubelet");
//! assert_eq!(
//!     ca_path(Path::new("/certs"), "xa5ly"),
//!     Path::new("/certs/xa5ly-ca.pem")
//! );
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod informer;
pub mod key;
pub mod kubernetes;
pub mod labels;
pub mod metrics;
pub mod reconciler;
pub mod reloader;
pub mod resources;
pub mod retry;
pub mod scrape;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;
