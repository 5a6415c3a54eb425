// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The Prometheus configuration ConfigMap.
//!
//! The desired state is the current Prometheus document with its managed scrape jobs
//! replaced by the jobs generated from the live guest clusters. After the update the
//! resource asks the [`Reloader`] to reload Prometheus, which also covers certificate
//! changes requested earlier in the same reconciliation.

use super::reload::reload_prometheus;
use super::{ManagedResource, Patch, StepOutcome};
use crate::config::ConfigMapConfig;
use crate::errors::{Error, Result};
use crate::key;
use crate::kubernetes::{KubeApi, UpdateOutcome};
use crate::metrics::{Telemetry, SCRAPE_CONFIGS_GENERATED};
use crate::reloader::Reloader;
use crate::scrape::{build_scrape_configs, merge, PrometheusConfig};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const RESOURCE_NAME: &str = "configmap";

/// A Prometheus ConfigMap together with the data key holding the configuration.
#[derive(Debug, Clone)]
pub struct PromConfigMap {
    config_map: ConfigMap,
    key: String,
}

impl PromConfigMap {
    /// Wrap `config_map`, reading its configuration from `key`.
    #[must_use]
    pub fn new(config_map: ConfigMap, key: impl Into<String>) -> Self {
        Self {
            config_map,
            key: key.into(),
        }
    }

    /// Name of the ConfigMap.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config_map.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace of the ConfigMap.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.config_map
            .metadata
            .namespace
            .as_deref()
            .unwrap_or_default()
    }

    /// Prometheus configuration text, if the key is present.
    #[must_use]
    pub fn prometheus_yaml(&self) -> Option<&str> {
        self.config_map
            .data
            .as_ref()
            .and_then(|data| data.get(&self.key))
            .map(String::as_str)
    }

    /// The wrapped ConfigMap.
    #[must_use]
    pub fn config_map(&self) -> &ConfigMap {
        &self.config_map
    }

    fn with_prometheus_yaml(mut self, yaml: String) -> Self {
        self.config_map
            .data
            .get_or_insert_with(Default::default)
            .insert(self.key.clone(), yaml);
        self
    }
}

/// Keeps the managed scrape jobs of the Prometheus ConfigMap in sync.
pub struct ConfigMapResource {
    kube: Arc<dyn KubeApi>,
    reloader: Arc<Reloader>,
    telemetry: Arc<dyn Telemetry>,
    config: ConfigMapConfig,
    certificate_directory: PathBuf,
}

impl ConfigMapResource {
    /// Create the resource for the ConfigMap named by `config`.
    ///
    /// Generated jobs reference certificate files under `certificate_directory`.
    pub fn new(
        config: ConfigMapConfig,
        certificate_directory: PathBuf,
        kube: Arc<dyn KubeApi>,
        reloader: Arc<Reloader>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            kube,
            reloader,
            telemetry,
            config,
            certificate_directory,
        }
    }

    fn not_found(&self) -> Error {
        Error::ConfigMapNotFound {
            namespace: self.config.namespace.clone(),
            name: self.config.name.clone(),
        }
    }

    async fn fetch(&self) -> Result<PromConfigMap> {
        let config_map = self
            .kube
            .get_config_map(&self.config.namespace, &self.config.name)
            .await?
            .ok_or_else(|| self.not_found())?;
        Ok(PromConfigMap::new(config_map, self.config.key.clone()))
    }
}

#[async_trait]
impl ManagedResource for ConfigMapResource {
    type State = PromConfigMap;

    fn name(&self) -> &'static str {
        RESOURCE_NAME
    }

    async fn current(&self) -> Result<PromConfigMap> {
        self.fetch().await
    }

    async fn desired(&self) -> Result<PromConfigMap> {
        let current = self.fetch().await?;
        let yaml = current
            .prometheus_yaml()
            .ok_or_else(|| Error::ConfigMapKeyNotFound {
                namespace: self.config.namespace.clone(),
                name: self.config.name.clone(),
                key: self.config.key.clone(),
            })?;

        let prometheus = PrometheusConfig::from_yaml(yaml).map_err(|e| Error::InvalidConfigMap {
            namespace: self.config.namespace.clone(),
            name: self.config.name.clone(),
            reason: e.to_string(),
        })?;

        let services = self
            .kube
            .list_services(&key::master_service_selector())
            .await?;
        let generated = build_scrape_configs(&services, &self.certificate_directory);
        #[allow(clippy::cast_precision_loss)]
        self.telemetry
            .observe(SCRAPE_CONFIGS_GENERATED, &[], generated.len() as f64);
        debug!(jobs = generated.len(), "Generated guest cluster scrape configs");

        let merged = merge(&prometheus, &generated)?.to_yaml()?;
        Ok(current.with_prometheus_yaml(merged))
    }

    fn patch(
        &self,
        current: &PromConfigMap,
        desired: PromConfigMap,
    ) -> Result<Patch<PromConfigMap>> {
        if current.name() != desired.name() {
            return Err(Error::WrongName {
                current: current.name().to_string(),
                desired: desired.name().to_string(),
            });
        }
        if current.namespace() != desired.namespace() {
            return Err(Error::WrongNamespace {
                current: current.namespace().to_string(),
                desired: desired.namespace().to_string(),
            });
        }

        if current.prometheus_yaml() == desired.prometheus_yaml() {
            return Ok(Patch::empty());
        }
        Ok(Patch::update(desired))
    }

    async fn apply(
        &self,
        patch: Patch<PromConfigMap>,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome> {
        if let Some(desired) = patch.update {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = self.kube.update_config_map(desired.config_map()) => outcome?,
            };
            match outcome {
                UpdateOutcome::Updated => {
                    info!(
                        namespace = %desired.namespace(),
                        name = %desired.name(),
                        "Updated Prometheus configmap"
                    );
                    self.reloader.request_reload();
                }
                UpdateOutcome::Conflict => {
                    info!(
                        namespace = %desired.namespace(),
                        name = %desired.name(),
                        "Prometheus configmap changed concurrently, converging on next reconciliation"
                    );
                }
                UpdateOutcome::NotFound => return Err(self.not_found()),
            }
        }

        reload_prometheus(&self.reloader, cancel).await
    }
}

#[cfg(test)]
#[path = "configmap_tests.rs"]
mod configmap_tests;
