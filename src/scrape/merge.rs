// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merging generated scrape configs into an existing Prometheus configuration.
//!
//! The document is kept as an untyped YAML mapping: only the `scrape_configs` list is
//! touched, every other top-level section and every unmanaged job survive verbatim,
//! including fields this crate does not model.

use super::types::ScrapeConfig;
use crate::constants::{JOB_NAME_KEY, SCRAPE_CONFIGS_KEY};
use crate::errors::{Error, Result};
use crate::key::is_managed_job;
use serde_yaml::{Mapping, Value};

/// A parsed Prometheus configuration document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrometheusConfig {
    document: Mapping,
}

impl PrometheusConfig {
    /// Parse a Prometheus YAML document.
    ///
    /// An empty document is an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the text is not YAML, the top level is not a
    /// mapping, or `scrape_configs` is present but not a list.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)
            .map_err(|e| {
                Error::InvalidConfig(format!("prometheus config is not valid yaml: {e}"))
            })?;

        let document = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(Error::InvalidConfig(
                    "prometheus config must be a mapping".to_string(),
                ))
            }
        };

        match document.get(SCRAPE_CONFIGS_KEY) {
            None | Some(Value::Null | Value::Sequence(_)) => Ok(Self { document }),
            Some(_) => Err(Error::InvalidConfig(format!(
                "{SCRAPE_CONFIGS_KEY} must be a list"
            ))),
        }
    }

    /// Serialize back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.document)?)
    }

    /// Raw scrape config entries, in document order.
    #[must_use]
    pub fn scrape_configs(&self) -> &[Value] {
        match self.document.get(SCRAPE_CONFIGS_KEY) {
            Some(Value::Sequence(entries)) => entries,
            _ => &[],
        }
    }

    /// Job names of all scrape config entries, in document order.
    #[must_use]
    pub fn job_names(&self) -> Vec<&str> {
        self.scrape_configs().iter().filter_map(job_name).collect()
    }

    /// Top-level value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }
}

fn job_name(entry: &Value) -> Option<&str> {
    entry.get(JOB_NAME_KEY).and_then(Value::as_str)
}

fn is_managed_entry(entry: &Value) -> bool {
    job_name(entry).is_some_and(is_managed_job)
}

/// Replace the managed jobs of `config` with `generated`.
///
/// The resulting `scrape_configs` holds every unmanaged entry in its original order,
/// followed by `generated` in the given order. Entries without a job name are treated
/// as unmanaged.
///
/// # Errors
///
/// Returns [`Error::Yaml`] if a generated scrape config cannot be converted to YAML.
pub fn merge(config: &PrometheusConfig, generated: &[ScrapeConfig]) -> Result<PrometheusConfig> {
    let key = Value::String(SCRAPE_CONFIGS_KEY.to_string());

    // Leave documents without a scrape config section alone when there is nothing to add.
    if !config.document.contains_key(&key) && generated.is_empty() {
        return Ok(config.clone());
    }

    let mut entries: Vec<Value> = config
        .scrape_configs()
        .iter()
        .filter(|entry| !is_managed_entry(entry))
        .cloned()
        .collect();

    for scrape_config in generated {
        entries.push(serde_yaml::to_value(scrape_config)?);
    }

    let mut merged = config.clone();
    // `insert` keeps the position of an existing key.
    merged.document.insert(key, Value::Sequence(entries));
    Ok(merged)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod merge_tests;
