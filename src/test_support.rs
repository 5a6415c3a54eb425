// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory collaborators shared by unit tests.

use crate::config::ConfigMapConfig;
use crate::errors::Result;
use crate::kubernetes::{KubeApi, UpdateOutcome};
use crate::metrics::Telemetry;
use crate::reloader::{Clock, Reloader};
use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::ByteString;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Whether `labels` satisfies an equality-based selector such as `a=b,c=d`.
fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.and_then(|l| l.get(key)).is_some_and(|v| v == value),
            None => false,
        })
}

/// [`KubeApi`] over in-memory objects.
#[derive(Default)]
pub struct FakeKube {
    services: Mutex<Vec<Service>>,
    secrets: Mutex<Vec<Secret>>,
    config_maps: Mutex<BTreeMap<(String, String), ConfigMap>>,
    conflict_next_update: AtomicBool,
    stall_updates: AtomicBool,
    updates: AtomicUsize,
}

impl FakeKube {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_services(&self, services: Vec<Service>) {
        *self.services.lock().expect("services lock") = services;
    }

    pub fn add_secret(&self, secret: Secret) {
        self.secrets.lock().expect("secrets lock").push(secret);
    }

    pub fn put_config_map(&self, config_map: ConfigMap) {
        let key = (
            config_map.metadata.namespace.clone().unwrap_or_default(),
            config_map.metadata.name.clone().unwrap_or_default(),
        );
        self.config_maps
            .lock()
            .expect("config maps lock")
            .insert(key, config_map);
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.config_maps
            .lock()
            .expect("config maps lock")
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Data value of `key` in the stored ConfigMap.
    pub fn config_map_data(&self, namespace: &str, name: &str, key: &str) -> Option<String> {
        self.config_map(namespace, name)
            .and_then(|cm| cm.data)
            .and_then(|mut data| data.remove(key))
    }

    pub fn fail_next_update_with_conflict(&self) {
        self.conflict_next_update.store(true, Ordering::SeqCst);
    }

    /// Make every following ConfigMap update hang forever.
    pub fn stall_updates(&self) {
        self.stall_updates.store(true, Ordering::SeqCst);
    }

    /// Number of successful ConfigMap updates.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KubeApi for FakeKube {
    async fn list_services(&self, selector: &str) -> Result<Vec<Service>> {
        Ok(self
            .services
            .lock()
            .expect("services lock")
            .iter()
            .filter(|s| matches_selector(s.metadata.labels.as_ref(), selector))
            .cloned()
            .collect())
    }

    async fn list_secrets(&self, namespace: &str, selector: &str) -> Result<Vec<Secret>> {
        Ok(self
            .secrets
            .lock()
            .expect("secrets lock")
            .iter()
            .filter(|s| s.metadata.namespace.as_deref() == Some(namespace))
            .filter(|s| matches_selector(s.metadata.labels.as_ref(), selector))
            .cloned()
            .collect())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.config_map(namespace, name))
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<UpdateOutcome> {
        if self.stall_updates.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.conflict_next_update.swap(false, Ordering::SeqCst) {
            return Ok(UpdateOutcome::Conflict);
        }

        let namespace = config_map.metadata.namespace.clone().unwrap_or_default();
        let name = config_map.metadata.name.clone().unwrap_or_default();
        let mut config_maps = self.config_maps.lock().expect("config maps lock");
        match config_maps.get_mut(&(namespace, name)) {
            Some(stored) => {
                *stored = config_map.clone();
                self.updates.fetch_add(1, Ordering::SeqCst);
                Ok(UpdateOutcome::Updated)
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }
}

/// [`Telemetry`] remembering every recorded sample.
#[derive(Default)]
pub struct RecordingTelemetry {
    samples: Mutex<Vec<(String, Vec<String>, f64)>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of increments of `name` with exactly `labels`.
    pub fn count(&self, name: &str, labels: &[&str]) -> usize {
        self.samples
            .lock()
            .expect("samples lock")
            .iter()
            .filter(|(n, l, _)| {
                n == name && l.iter().map(String::as_str).eq(labels.iter().copied())
            })
            .count()
    }

    /// Values observed on `name`, in order.
    pub fn observed(&self, name: &str) -> Vec<f64> {
        self.samples
            .lock()
            .expect("samples lock")
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, _, v)| *v)
            .collect()
    }
}

impl Telemetry for RecordingTelemetry {
    fn inc(&self, name: &str, labels: &[&str]) {
        self.observe(name, labels, 1.0);
    }

    fn observe(&self, name: &str, labels: &[&str], value: f64) {
        self.samples.lock().expect("samples lock").push((
            name.to_string(),
            labels.iter().map(ToString::to_string).collect(),
            value,
        ));
    }
}

/// [`Clock`] that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += chrono::Duration::from_std(by).expect("duration in range");
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Master service of guest cluster `cluster_id`, living in a namespace of the same name.
pub fn master_service(cluster_id: &str) -> Service {
    serde_json::from_value(json!({
        "metadata": {
            "name": "apiserver",
            "namespace": cluster_id,
            "labels": { "app": "master" },
            "annotations": { "giantswarm.io/prometheus-cluster": cluster_id }
        }
    }))
    .expect("valid service fixture")
}

/// Certificate secret of `cluster_id` holding the given data keys.
pub fn certificate_secret(namespace: &str, cluster_id: &str, keys: &[(&str, &str)]) -> Secret {
    let mut secret: Secret = serde_json::from_value(json!({
        "metadata": {
            "name": format!("{cluster_id}-prometheus"),
            "namespace": namespace,
            "labels": { "clusterComponent": "prometheus", "clusterID": cluster_id }
        }
    }))
    .expect("valid secret fixture");

    secret.data = Some(
        keys.iter()
            .map(|(key, value)| ((*key).to_string(), ByteString(value.as_bytes().to_vec())))
            .collect(),
    );
    secret
}

/// Prometheus ConfigMap holding `yaml` under `key`.
pub fn prometheus_config_map(namespace: &str, name: &str, key: &str, yaml: &str) -> ConfigMap {
    let mut config_map: ConfigMap = serde_json::from_value(json!({
        "metadata": { "name": name, "namespace": namespace, "resourceVersion": "1" }
    }))
    .expect("valid configmap fixture");

    config_map.data = Some(BTreeMap::from([(key.to_string(), yaml.to_string())]));
    config_map
}

/// Coordinates of the ConfigMap used across tests: `monitoring/prometheus`, key `prometheus.yml`.
pub fn config_map_config() -> ConfigMapConfig {
    ConfigMapConfig {
        key: "prometheus.yml".to_string(),
        name: "prometheus".to_string(),
        namespace: "monitoring".to_string(),
    }
}

/// Reloader talking to `prometheus_address` and reading [`config_map_config`] from `kube`.
pub fn reloader(
    prometheus_address: &str,
    minimum_reload_time: Duration,
    kube: Arc<FakeKube>,
    clock: Arc<ManualClock>,
    telemetry: Arc<RecordingTelemetry>,
) -> Reloader {
    Reloader::new(
        &Url::parse(prometheus_address).expect("valid prometheus address"),
        minimum_reload_time,
        config_map_config(),
        kube,
        clock,
        telemetry,
    )
    .expect("reloader builds")
}
