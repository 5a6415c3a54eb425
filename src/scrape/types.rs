// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Serde model of the subset of the Prometheus configuration grammar we generate.
//!
//! Field names and enum spellings follow the Prometheus `scrape_config` reference so
//! that `serde_yaml` output can be loaded by Prometheus unchanged. Optional fields are
//! omitted when unset; maps are `BTreeMap` so serialization order never depends on
//! hashing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One Prometheus `scrape_config` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Unique job name
    pub job_name: String,

    /// Protocol used to scrape targets
    pub scheme: Scheme,

    /// TLS settings of the scrape request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    /// Kubernetes service discovery blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kubernetes_sd_configs: Vec<KubernetesSdConfig>,

    /// Static target groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_configs: Vec<StaticConfig>,

    /// Target relabeling applied before scraping
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relabel_configs: Vec<RelabelConfig>,

    /// Sample relabeling applied after scraping
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metric_relabel_configs: Vec<RelabelConfig>,
}

/// Scrape protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP
    Http,
    /// HTTP over TLS
    Https,
}

/// Client TLS material and verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// CA certificate used to verify the server
    pub ca_file: String,
    /// Client certificate
    pub cert_file: String,
    /// Client private key
    pub key_file: String,
    /// Skip server certificate verification
    pub insecure_skip_verify: bool,
}

/// Kubernetes service discovery role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdRole {
    /// Discover service endpoints
    Endpoints,
    /// Discover nodes
    Node,
}

/// One `kubernetes_sd_configs` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesSdConfig {
    /// API server of the cluster to discover targets in
    pub api_server: String,
    /// Kind of object turned into targets
    pub role: SdRole,
    /// TLS settings used against the API server
    pub tls_config: TlsConfig,
}

/// One `static_configs` target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    /// `host:port` targets
    pub targets: Vec<String>,
    /// Labels attached to every target of the group
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Relabel action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelabelAction {
    /// Write `replacement` into `target_label`
    Replace,
    /// Keep only matching targets/samples
    Keep,
    /// Drop matching targets/samples
    Drop,
}

/// One `relabel_configs` / `metric_relabel_configs` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelabelConfig {
    /// Labels whose values are concatenated and matched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,

    /// Regular expression matched against the concatenated source values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Label written by a `replace` action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,

    /// Value written by a `replace` action, may reference regex groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,

    /// Action to perform
    pub action: RelabelAction,
}

impl RelabelConfig {
    /// `keep` rule over `source_labels` matching `regex`.
    pub fn keep(source_labels: &[&str], regex: impl Into<String>) -> Self {
        Self {
            source_labels: to_strings(source_labels),
            regex: Some(regex.into()),
            target_label: None,
            replacement: None,
            action: RelabelAction::Keep,
        }
    }

    /// `drop` rule over `source_labels` matching `regex`.
    pub fn drop(source_labels: &[&str], regex: impl Into<String>) -> Self {
        Self {
            source_labels: to_strings(source_labels),
            regex: Some(regex.into()),
            target_label: None,
            replacement: None,
            action: RelabelAction::Drop,
        }
    }

    /// Set `target_label` to a constant value.
    pub fn set(target_label: &str, replacement: impl Into<String>) -> Self {
        Self {
            source_labels: Vec::new(),
            regex: None,
            target_label: Some(target_label.to_string()),
            replacement: Some(replacement.into()),
            action: RelabelAction::Replace,
        }
    }

    /// Copy the value of `source_label` into `target_label`.
    pub fn copy(source_label: &str, target_label: &str) -> Self {
        Self {
            source_labels: vec![source_label.to_string()],
            regex: None,
            target_label: Some(target_label.to_string()),
            replacement: None,
            action: RelabelAction::Replace,
        }
    }

    /// Rewrite `target_label` from `source_labels` matching `regex` into `replacement`.
    pub fn rewrite(
        source_labels: &[&str],
        regex: impl Into<String>,
        target_label: &str,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            source_labels: to_strings(source_labels),
            regex: Some(regex.into()),
            target_label: Some(target_label.to_string()),
            replacement: Some(replacement.into()),
            action: RelabelAction::Replace,
        }
    }
}

fn to_strings(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|label| (*label).to_string()).collect()
}
