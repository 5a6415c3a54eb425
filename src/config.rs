// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line flags and validated controller configuration.
//!
//! Every flag can also be set through the environment variable named in its help
//! output. [`Config::try_from`] turns raw [`Args`] into a [`Config`]; any invalid value
//! is reported as [`Error::InvalidConfig`] and stops the process at boot.

use crate::constants::{
    DEFAULT_CERTIFICATE_COMPONENT_NAME, DEFAULT_CERTIFICATE_DIRECTORY,
    DEFAULT_CERTIFICATE_NAMESPACE, DEFAULT_CERTIFICATE_PERMISSION, DEFAULT_CONFIGMAP_KEY,
    DEFAULT_CONFIGMAP_NAME, DEFAULT_CONFIGMAP_NAMESPACE, DEFAULT_LISTEN_ADDRESS,
    DEFAULT_MINIMUM_RELOAD_TIME_SECS, DEFAULT_PROMETHEUS_ADDRESS, DEFAULT_RESOURCE_RETRIES,
    DEFAULT_RESYNC_PERIOD_SECS,
};
use crate::errors::{Error, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Highest permission bits accepted for certificate files
const MAX_PERMISSION: u32 = 0o777;

/// Raw command line flags.
#[derive(Parser, Debug, Clone)]
#[command(name = "prometheus-config-controller", version, about, long_about = None)]
pub struct Args {
    /// Address of the Kubernetes API server, empty for the default client
    #[arg(
        long = "service.kubernetes.address",
        env = "SERVICE_KUBERNETES_ADDRESS",
        default_value = ""
    )]
    pub kubernetes_address: String,

    /// Use the in-cluster service account configuration
    #[arg(long = "service.kubernetes.incluster", env = "SERVICE_KUBERNETES_INCLUSTER")]
    pub kubernetes_in_cluster: bool,

    /// Path of a kubeconfig file
    #[arg(
        long = "service.kubernetes.kubeconfig",
        env = "SERVICE_KUBERNETES_KUBECONFIG",
        default_value = ""
    )]
    pub kubernetes_kubeconfig: String,

    /// CA certificate file of the Kubernetes API server
    #[arg(
        long = "service.kubernetes.tls.cafile",
        env = "SERVICE_KUBERNETES_TLS_CAFILE",
        default_value = ""
    )]
    pub kubernetes_ca_file: String,

    /// Client certificate file for the Kubernetes API server
    #[arg(
        long = "service.kubernetes.tls.crtfile",
        env = "SERVICE_KUBERNETES_TLS_CRTFILE",
        default_value = ""
    )]
    pub kubernetes_crt_file: String,

    /// Client key file for the Kubernetes API server
    #[arg(
        long = "service.kubernetes.tls.keyfile",
        env = "SERVICE_KUBERNETES_TLS_KEYFILE",
        default_value = ""
    )]
    pub kubernetes_key_file: String,

    /// Base URL of the Prometheus server
    #[arg(
        long = "service.prometheus.address",
        env = "SERVICE_PROMETHEUS_ADDRESS",
        default_value = DEFAULT_PROMETHEUS_ADDRESS
    )]
    pub prometheus_address: String,

    /// Minimum time between two Prometheus reloads, in seconds
    #[arg(
        long = "service.prometheus.minimumreloadtime",
        env = "SERVICE_PROMETHEUS_MINIMUMRELOADTIME",
        default_value_t = DEFAULT_MINIMUM_RELOAD_TIME_SECS
    )]
    pub minimum_reload_time_secs: u64,

    /// Number of times a failed resource step is retried
    #[arg(
        long = "service.resource.retries",
        env = "SERVICE_RESOURCE_RETRIES",
        default_value_t = DEFAULT_RESOURCE_RETRIES
    )]
    pub resource_retries: usize,

    /// Component name selecting certificate secrets
    #[arg(
        long = "service.certificate.componentname",
        env = "SERVICE_CERTIFICATE_COMPONENTNAME",
        default_value = DEFAULT_CERTIFICATE_COMPONENT_NAME
    )]
    pub certificate_component_name: String,

    /// Directory certificate files are written to
    #[arg(
        long = "service.certificate.directory",
        env = "SERVICE_CERTIFICATE_DIRECTORY",
        default_value = DEFAULT_CERTIFICATE_DIRECTORY
    )]
    pub certificate_directory: String,

    /// Namespace of the certificate secrets
    #[arg(
        long = "service.certificate.namespace",
        env = "SERVICE_CERTIFICATE_NAMESPACE",
        default_value = DEFAULT_CERTIFICATE_NAMESPACE
    )]
    pub certificate_namespace: String,

    /// Octal permission bits of written certificate files
    #[arg(
        long = "service.certificate.permission",
        env = "SERVICE_CERTIFICATE_PERMISSION",
        default_value = DEFAULT_CERTIFICATE_PERMISSION
    )]
    pub certificate_permission: String,

    /// Data key of the Prometheus configuration in the ConfigMap
    #[arg(
        long = "service.configmap.key",
        env = "SERVICE_CONFIGMAP_KEY",
        default_value = DEFAULT_CONFIGMAP_KEY
    )]
    pub configmap_key: String,

    /// Name of the Prometheus ConfigMap
    #[arg(
        long = "service.configmap.name",
        env = "SERVICE_CONFIGMAP_NAME",
        default_value = DEFAULT_CONFIGMAP_NAME
    )]
    pub configmap_name: String,

    /// Namespace of the Prometheus ConfigMap
    #[arg(
        long = "service.configmap.namespace",
        env = "SERVICE_CONFIGMAP_NAMESPACE",
        default_value = DEFAULT_CONFIGMAP_NAMESPACE
    )]
    pub configmap_namespace: String,

    /// Interval of the artificial reconcile tick, in seconds
    #[arg(
        long = "service.controller.resyncperiod",
        env = "SERVICE_CONTROLLER_RESYNCPERIOD",
        default_value_t = DEFAULT_RESYNC_PERIOD_SECS
    )]
    pub resync_period_secs: u64,

    /// Listen address of the health, version and metrics server
    #[arg(
        long = "server.listen.address",
        env = "SERVER_LISTEN_ADDRESS",
        default_value = DEFAULT_LISTEN_ADDRESS
    )]
    pub listen_address: String,
}

/// Client certificate material for an explicit API server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubernetesTls {
    /// CA certificate file
    pub ca_file: PathBuf,
    /// Client certificate file
    pub crt_file: PathBuf,
    /// Client key file
    pub key_file: PathBuf,
}

/// How the Kubernetes client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubernetesConnection {
    /// In-cluster service account
    InCluster,
    /// Explicit kubeconfig file
    Kubeconfig(PathBuf),
    /// Explicit API server address, optionally with client certificates
    Address {
        /// API server URL
        url: Url,
        /// Client certificate material
        tls: Option<KubernetesTls>,
    },
    /// `KUBECONFIG`, `~/.kube/config` or in-cluster, whichever is found first
    Inferred,
}

/// Where certificate files come from and how they are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateConfig {
    /// `clusterComponent` label value of certificate secrets
    pub component_name: String,
    /// Directory owned by the controller
    pub directory: PathBuf,
    /// Namespace of certificate secrets
    pub namespace: String,
    /// Unix permission bits of written files
    pub permission: u32,
}

/// Coordinates of the Prometheus ConfigMap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapConfig {
    /// Data key holding the Prometheus YAML
    pub key: String,
    /// ConfigMap name
    pub name: String,
    /// ConfigMap namespace
    pub namespace: String,
}

/// Validated controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Kubernetes client selection
    pub kubernetes: KubernetesConnection,
    /// Prometheus base URL
    pub prometheus_address: Url,
    /// Minimum time between two reloads
    pub minimum_reload_time: Duration,
    /// Retries of a failed resource step
    pub resource_retries: usize,
    /// Certificate settings
    pub certificate: CertificateConfig,
    /// Prometheus ConfigMap coordinates
    pub config_map: ConfigMapConfig,
    /// Interval of the artificial reconcile tick
    pub resync_period: Duration,
    /// HTTP server listen address
    pub listen_address: SocketAddr,
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self> {
        let prometheus_address =
            parse_http_url("service.prometheus.address", &args.prometheus_address)?;

        if args.minimum_reload_time_secs == 0 {
            return Err(invalid(
                "service.prometheus.minimumreloadtime",
                "must be greater than zero",
            ));
        }
        if args.resync_period_secs == 0 {
            return Err(invalid(
                "service.controller.resyncperiod",
                "must be greater than zero",
            ));
        }

        let listen_address = args.listen_address.parse::<SocketAddr>().map_err(|e| {
            invalid(
                "server.listen.address",
                &format!("{:?} is not a socket address: {e}", args.listen_address),
            )
        })?;

        let certificate = CertificateConfig {
            component_name: required(
                "service.certificate.componentname",
                args.certificate_component_name.clone(),
            )?,
            directory: PathBuf::from(required(
                "service.certificate.directory",
                args.certificate_directory.clone(),
            )?),
            namespace: required(
                "service.certificate.namespace",
                args.certificate_namespace.clone(),
            )?,
            permission: parse_permission(&args.certificate_permission)?,
        };

        Ok(Self {
            kubernetes: kubernetes_connection(&args)?,
            prometheus_address,
            minimum_reload_time: Duration::from_secs(args.minimum_reload_time_secs),
            resource_retries: args.resource_retries,
            certificate,
            config_map: ConfigMapConfig {
                key: required("service.configmap.key", args.configmap_key)?,
                name: required("service.configmap.name", args.configmap_name)?,
                namespace: required("service.configmap.namespace", args.configmap_namespace)?,
            },
            resync_period: Duration::from_secs(args.resync_period_secs),
            listen_address,
        })
    }
}

fn invalid(flag: &str, reason: &str) -> Error {
    Error::InvalidConfig(format!("--{flag} {reason}"))
}

fn required(flag: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(invalid(flag, "must not be empty"));
    }
    Ok(value)
}

fn parse_http_url(flag: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| invalid(flag, &format!("{value:?} is not a valid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(invalid(
            flag,
            &format!("{value:?} must be an absolute http or https URL"),
        )),
    }
}

/// Parse octal permission bits such as `0600` or `600`.
fn parse_permission(value: &str) -> Result<u32> {
    let digits = value.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);

    let permission = u32::from_str_radix(digits, 8).map_err(|e| {
        invalid(
            "service.certificate.permission",
            &format!("{value:?} is not an octal number: {e}"),
        )
    })?;

    if permission > MAX_PERMISSION {
        return Err(invalid(
            "service.certificate.permission",
            &format!("{value:?} exceeds {MAX_PERMISSION:o}"),
        ));
    }
    Ok(permission)
}

fn optional_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn kubernetes_connection(args: &Args) -> Result<KubernetesConnection> {
    if args.kubernetes_in_cluster {
        return Ok(KubernetesConnection::InCluster);
    }
    if let Some(path) = optional_path(&args.kubernetes_kubeconfig) {
        return Ok(KubernetesConnection::Kubeconfig(path));
    }
    if args.kubernetes_address.trim().is_empty() {
        return Ok(KubernetesConnection::Inferred);
    }

    let url = parse_http_url("service.kubernetes.address", &args.kubernetes_address)?;
    let files = [
        optional_path(&args.kubernetes_ca_file),
        optional_path(&args.kubernetes_crt_file),
        optional_path(&args.kubernetes_key_file),
    ];

    let tls = match files {
        [Some(ca_file), Some(crt_file), Some(key_file)] => Some(KubernetesTls {
            ca_file,
            crt_file,
            key_file,
        }),
        [None, None, None] => None,
        _ => {
            return Err(invalid(
                "service.kubernetes.tls.cafile",
                "and the crtfile and keyfile flags must be set together",
            ))
        }
    };

    Ok(KubernetesConnection::Address { url, tls })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
