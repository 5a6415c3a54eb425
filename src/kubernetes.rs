// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes API access used by the resources.
//!
//! Resources talk to the host cluster through the narrow [`KubeApi`] trait so they can
//! be exercised against an in-memory fake. [`KubeClient`] is the production
//! implementation on top of `kube::Client`; every call goes through
//! [`retry_api_call`] so transient API server errors are absorbed here.

use crate::config::{KubernetesConnection, KubernetesTls};
use crate::errors::{Error, Result};
use crate::retry::retry_api_call;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::api::{ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use serde_json::json;
use tracing::{debug, info};
use url::Url;

/// Context, cluster and user name of the in-memory kubeconfig built from flags
const FLAG_KUBECONFIG_NAME: &str = "flags";

/// HTTP status returned when an object does not exist
const STATUS_NOT_FOUND: u16 = 404;

/// HTTP status returned when an update raced another writer
const STATUS_CONFLICT: u16 = 409;

/// Result of a ConfigMap update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The ConfigMap was written
    Updated,
    /// The resource version was stale; another writer got there first
    Conflict,
    /// The ConfigMap no longer exists
    NotFound,
}

/// Host cluster operations needed to reconcile certificates and the Prometheus
/// ConfigMap.
#[async_trait::async_trait]
pub trait KubeApi: Send + Sync {
    /// List services in all namespaces matching `selector`.
    async fn list_services(&self, selector: &str) -> Result<Vec<Service>>;

    /// List secrets in `namespace` matching `selector`.
    async fn list_secrets(&self, namespace: &str, selector: &str) -> Result<Vec<Secret>>;

    /// Fetch a ConfigMap, `None` if it does not exist.
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    /// Replace a ConfigMap, addressed by its own metadata.
    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<UpdateOutcome>;
}

/// [`KubeApi`] backed by a live API server.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    /// Wrap a connected client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Build a Kubernetes client for the configured connection.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if the connection settings cannot be turned into
/// a client configuration, or [`Error::Kube`] if the client cannot be built.
pub async fn connect(connection: &KubernetesConnection) -> Result<Client> {
    let config = match connection {
        KubernetesConnection::InCluster => {
            info!("Using in-cluster Kubernetes configuration");
            kube::Config::incluster()
                .map_err(|e| Error::InvalidConfig(format!("in-cluster configuration: {e}")))?
        }
        KubernetesConnection::Kubeconfig(path) => {
            info!(path = %path.display(), "Using kubeconfig file");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::InvalidConfig(format!("reading kubeconfig {}: {e}", path.display()))
            })?;
            from_kubeconfig(kubeconfig).await?
        }
        KubernetesConnection::Address { url, tls } => {
            info!(address = %url, "Using explicit Kubernetes API address");
            from_kubeconfig(address_kubeconfig(url, tls.as_ref())?).await?
        }
        KubernetesConnection::Inferred => {
            info!("Inferring Kubernetes configuration");
            return Ok(Client::try_default().await?);
        }
    };

    Ok(Client::try_from(config)?)
}

async fn from_kubeconfig(kubeconfig: Kubeconfig) -> Result<kube::Config> {
    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::InvalidConfig(format!("kubeconfig: {e}")))
}

/// In-memory kubeconfig pointing at `url`, with file-based client certificates.
fn address_kubeconfig(url: &Url, tls: Option<&KubernetesTls>) -> Result<Kubeconfig> {
    let mut cluster = json!({ "server": url.as_str().trim_end_matches('/') });
    let mut user = json!({});

    if let Some(tls) = tls {
        cluster["certificate-authority"] = json!(tls.ca_file.display().to_string());
        user["client-certificate"] = json!(tls.crt_file.display().to_string());
        user["client-key"] = json!(tls.key_file.display().to_string());
    }

    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": FLAG_KUBECONFIG_NAME, "cluster": cluster }],
        "users": [{ "name": FLAG_KUBECONFIG_NAME, "user": user }],
        "contexts": [{
            "name": FLAG_KUBECONFIG_NAME,
            "context": { "cluster": FLAG_KUBECONFIG_NAME, "user": FLAG_KUBECONFIG_NAME }
        }],
        "current-context": FLAG_KUBECONFIG_NAME,
    }))
    .map_err(|e| Error::InvalidConfig(format!("kubernetes address configuration: {e}")))
}

fn api_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

#[async_trait::async_trait]
impl KubeApi for KubeClient {
    async fn list_services(&self, selector: &str) -> Result<Vec<Service>> {
        let api: Api<Service> = Api::all(self.client.clone());
        let params = ListParams::default().labels(selector);

        let list = retry_api_call(|| api.list(&params), "list master services").await?;
        debug!(selector = %selector, count = list.items.len(), "Listed services");
        Ok(list.items)
    }

    async fn list_secrets(&self, namespace: &str, selector: &str) -> Result<Vec<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(selector);

        let list = retry_api_call(|| api.list(&params), "list certificate secrets").await?;
        debug!(
            namespace = %namespace,
            selector = %selector,
            count = list.items.len(),
            "Listed secrets"
        );
        Ok(list.items)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(retry_api_call(|| api.get_opt(name), "get prometheus configmap").await?)
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<UpdateOutcome> {
        let namespace = config_map.metadata.namespace.as_deref().unwrap_or_default();
        let name = config_map.metadata.name.as_deref().unwrap_or_default();
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams::default();

        match retry_api_call(
            || api.replace(name, &params, config_map),
            "update prometheus configmap",
        )
        .await
        {
            Ok(_) => Ok(UpdateOutcome::Updated),
            Err(err) => match api_code(&err) {
                Some(STATUS_CONFLICT) => Ok(UpdateOutcome::Conflict),
                Some(STATUS_NOT_FOUND) => Ok(UpdateOutcome::NotFound),
                _ => Err(Error::Kube(err)),
            },
        }
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
