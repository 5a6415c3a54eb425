// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rate-limited Prometheus configuration reloads.
//!
//! Resources that change what Prometheus reads from disk call
//! [`Reloader::request_reload`]. [`Reloader::reload`] then POSTs to `/-/reload` at
//! most once per minimum reload interval. Without a pending request it only reloads
//! when the configuration Prometheus reports differs from the ConfigMap.
//!
//! The state lock is held only around reads and writes of the two state fields.
//! A separate async lock serialises reload decisions so that at most one POST is in
//! flight.

use crate::config::ConfigMapConfig;
use crate::constants::{
    PROMETHEUS_CONFIG_PATH, PROMETHEUS_HTTP_TIMEOUT_SECS, PROMETHEUS_RELOAD_PATH,
    PROMETHEUS_STATUS_SUCCESS,
};
use crate::errors::{Error, Result};
use crate::kubernetes::KubeApi;
use crate::metrics::{Telemetry, RELOADS};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] reading the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Body of `GET /api/v1/status/config`.
#[derive(Debug, Deserialize)]
struct ConfigResponse {
    status: String,
    #[serde(default)]
    data: Option<ConfigData>,
}

#[derive(Debug, Deserialize)]
struct ConfigData {
    yaml: String,
}

#[derive(Debug, Default)]
struct ReloadState {
    last_reload: Option<DateTime<Utc>>,
    reload_requested: bool,
}

/// Rate-limited trigger of Prometheus configuration reloads.
pub struct Reloader {
    http: reqwest::Client,
    url_config: Url,
    url_reload: Url,
    minimum_reload_time: Duration,
    config_map: ConfigMapConfig,
    kube: Arc<dyn KubeApi>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
    state: Mutex<ReloadState>,
    in_flight: tokio::sync::Mutex<()>,
}

/// Append an absolute API path to a base URL, keeping any path prefix of the base.
fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let joined = format!("{}{path}", base.as_str().trim_end_matches('/'));
    Url::parse(&joined)
        .map_err(|e| Error::InvalidConfig(format!("prometheus endpoint {joined}: {e}")))
}

impl Reloader {
    /// Create a reloader for the Prometheus server at `prometheus_address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the endpoint URLs cannot be derived, or
    /// [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(
        prometheus_address: &Url,
        minimum_reload_time: Duration,
        config_map: ConfigMapConfig,
        kube: Arc<dyn KubeApi>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROMETHEUS_HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            url_config: endpoint(prometheus_address, PROMETHEUS_CONFIG_PATH)?,
            url_reload: endpoint(prometheus_address, PROMETHEUS_RELOAD_PATH)?,
            minimum_reload_time,
            config_map,
            kube,
            clock,
            telemetry,
            state: Mutex::new(ReloadState::default()),
            in_flight: tokio::sync::Mutex::new(()),
        })
    }

    /// URL Prometheus reports its loaded configuration on.
    #[must_use]
    pub fn url_config(&self) -> &Url {
        &self.url_config
    }

    /// URL that triggers a configuration reload.
    #[must_use]
    pub fn url_reload(&self) -> &Url {
        &self.url_reload
    }

    fn state(&self) -> MutexGuard<'_, ReloadState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Mark the on-disk configuration as changed so the next reload is unconditional.
    pub fn request_reload(&self) {
        self.state().reload_requested = true;
        debug!("Prometheus reload requested");
    }

    /// Whether a reload has been requested and not yet performed.
    #[must_use]
    pub fn is_reload_requested(&self) -> bool {
        self.state().reload_requested
    }

    /// Time of the last successful reload.
    #[must_use]
    pub fn last_reload(&self) -> Option<DateTime<Utc>> {
        self.state().last_reload
    }

    /// Reload Prometheus if requested or if its loaded configuration is stale.
    ///
    /// Returns `true` when a reload was performed and `false` when nothing changed.
    ///
    /// # Errors
    ///
    /// - [`Error::ReloadThrottle`] if the previous reload was too recent
    /// - [`Error::ExecutionFailed`] on an unexpected Prometheus response
    /// - [`Error::Cancelled`] if `cancel` fires before the reload is sent
    /// - ConfigMap and transport errors from the staleness check
    pub async fn reload(&self, cancel: &CancellationToken) -> Result<bool> {
        let _in_flight = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.in_flight.lock() => guard,
        };

        let now = self.clock.now();
        let requested = {
            let state = self.state();
            if let Some(remaining) = self.remaining_throttle(state.last_reload, now) {
                drop(state);
                self.telemetry.inc(RELOADS, &["throttled"]);
                info!(remaining = ?remaining, "Prometheus reload throttled");
                return Err(Error::ReloadThrottle { remaining });
            }
            state.reload_requested
        };

        if !requested {
            let stale = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                stale = self.is_config_stale() => stale?,
            };
            if !stale {
                self.telemetry.inc(RELOADS, &["unchanged"]);
                debug!("Prometheus configuration is up to date");
                return Ok(false);
            }
        }

        // Once sent, the reload runs to completion so the result is always recorded.
        self.state().reload_requested = false;
        match self.post_reload().await {
            Ok(()) => {
                self.state().last_reload = Some(self.clock.now());
                self.telemetry.inc(RELOADS, &["success"]);
                info!(url = %self.url_reload, requested, "Prometheus configuration reloaded");
                Ok(true)
            }
            Err(e) => {
                if requested {
                    self.state().reload_requested = true;
                }
                self.telemetry.inc(RELOADS, &["failed"]);
                warn!(url = %self.url_reload, error = %e, "Prometheus reload failed");
                Err(e)
            }
        }
    }

    fn remaining_throttle(
        &self,
        last_reload: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let elapsed = now.signed_duration_since(last_reload?).to_std().unwrap_or_default();
        self.minimum_reload_time.checked_sub(elapsed).filter(|remaining| !remaining.is_zero())
    }

    async fn post_reload(&self) -> Result<()> {
        let response = self.http.post(self.url_reload.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::ExecutionFailed(format!(
                "POST {} returned {status}",
                self.url_reload
            )));
        }
        Ok(())
    }

    async fn loaded_config(&self) -> Result<String> {
        let response = self.http.get(self.url_config.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::ExecutionFailed(format!(
                "GET {} returned {status}",
                self.url_config
            )));
        }

        let body: ConfigResponse = response.json().await?;
        match body {
            ConfigResponse {
                status,
                data: Some(data),
            } if status == PROMETHEUS_STATUS_SUCCESS => Ok(data.yaml),
            ConfigResponse { status, .. } => Err(Error::ExecutionFailed(format!(
                "GET {} reported status {status:?}",
                self.url_config
            ))),
        }
    }

    async fn configured_config(&self) -> Result<String> {
        let ConfigMapConfig {
            key,
            name,
            namespace,
        } = &self.config_map;

        let config_map = self
            .kube
            .get_config_map(namespace, name)
            .await?
            .ok_or_else(|| Error::ConfigMapNotFound {
                namespace: namespace.clone(),
                name: name.clone(),
            })?;

        config_map
            .data
            .and_then(|mut data| data.remove(key))
            .ok_or_else(|| Error::ConfigMapKeyNotFound {
                namespace: namespace.clone(),
                name: name.clone(),
                key: key.clone(),
            })
    }

    async fn is_config_stale(&self) -> Result<bool> {
        let loaded = self.loaded_config().await?;
        let configured = self.configured_config().await?;
        Ok(loaded != configured)
    }
}

#[cfg(test)]
#[path = "reloader_tests.rs"]
mod reloader_tests;
