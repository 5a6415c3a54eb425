// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic names, paths and selectors derived from guest cluster services.
//!
//! Every other module goes through these helpers so that a certificate path written
//! by the certificate resource is byte-identical to the one referenced from the
//! generated scrape configs.

use crate::constants::{CERTIFICATE_FILE_EXTENSION, MANAGED_JOB_PREFIX};
use crate::labels::{
    APP_LABEL, APP_MASTER, CLUSTER_ANNOTATION, CLUSTER_COMPONENT_LABEL, CLUSTER_ID_SECRET_LABEL,
    ETCD_DOMAIN_ANNOTATION, SECRET_CA_KEY, SECRET_CRT_KEY, SECRET_KEY_KEY,
};
use k8s_openapi::api::core::v1::Service;
use std::path::{Path, PathBuf};

/// Label selector matching master services in the host cluster.
#[must_use]
pub fn master_service_selector() -> String {
    format!("{APP_LABEL}={APP_MASTER}")
}

/// Label selector matching the certificate secret of one guest cluster.
#[must_use]
pub fn certificate_secret_selector(component_name: &str, cluster_id: &str) -> String {
    format!("{CLUSTER_COMPONENT_LABEL}={component_name},{CLUSTER_ID_SECRET_LABEL}={cluster_id}")
}

/// Guest cluster id carried by a service, if annotated.
#[must_use]
pub fn cluster_id(service: &Service) -> Option<&str> {
    annotation(service, CLUSTER_ANNOTATION)
}

/// `host:port` etcd target carried by a service, if annotated.
#[must_use]
pub fn etcd_domain(service: &Service) -> Option<&str> {
    annotation(service, ETCD_DOMAIN_ANNOTATION)
}

fn annotation<'a>(service: &'a Service, key: &str) -> Option<&'a str> {
    service
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Whether a service represents a live guest cluster.
///
/// Services without the cluster annotation, or that are being deleted, are ignored.
#[must_use]
pub fn is_valid_service(service: &Service) -> bool {
    cluster_id(service).is_some() && service.metadata.deletion_timestamp.is_none()
}

/// Host of a guest cluster API server as reachable from the host cluster.
///
/// Returns `<service name>.<service namespace>`.
#[must_use]
pub fn api_server_host(service: &Service) -> String {
    format!(
        "{}.{}",
        service.metadata.name.as_deref().unwrap_or_default(),
        service.metadata.namespace.as_deref().unwrap_or_default()
    )
}

/// HTTPS URL of a guest cluster API server.
#[must_use]
pub fn api_server_url(service: &Service) -> String {
    format!("https://{}", api_server_host(service))
}

/// Namespace of a service, empty when unset.
#[must_use]
pub fn service_namespace(service: &Service) -> &str {
    service.metadata.namespace.as_deref().unwrap_or_default()
}

/// Job name of one scrape job kind for a guest cluster namespace.
#[must_use]
pub fn job_name(namespace: &str, kind: &str) -> String {
    format!("{MANAGED_JOB_PREFIX}{namespace}-{kind}")
}

/// Whether a scrape job is owned by this controller.
#[must_use]
pub fn is_managed_job(job_name: &str) -> bool {
    job_name.starts_with(MANAGED_JOB_PREFIX)
}

/// The three pieces of TLS material materialized per guest cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CertKind {
    /// CA certificate
    Ca,
    /// Client certificate
    Crt,
    /// Client private key
    Key,
}

impl CertKind {
    /// All kinds in file-emission order.
    pub const ALL: [CertKind; 3] = [CertKind::Ca, CertKind::Crt, CertKind::Key];

    /// Secret data key holding this material.
    #[must_use]
    pub fn secret_key(self) -> &'static str {
        match self {
            CertKind::Ca => SECRET_CA_KEY,
            CertKind::Crt => SECRET_CRT_KEY,
            CertKind::Key => SECRET_KEY_KEY,
        }
    }
}

/// Path of one certificate file: `<cert_dir>/<cluster_id>-<ca|crt|key>.pem`.
#[must_use]
pub fn cert_path(cert_dir: &Path, cluster_id: &str, kind: CertKind) -> PathBuf {
    cert_dir.join(format!(
        "{cluster_id}-{}.{CERTIFICATE_FILE_EXTENSION}",
        kind.secret_key()
    ))
}

/// Path of the CA certificate file of a guest cluster.
#[must_use]
pub fn ca_path(cert_dir: &Path, cluster_id: &str) -> PathBuf {
    cert_path(cert_dir, cluster_id, CertKind::Ca)
}

/// Path of the client certificate file of a guest cluster.
#[must_use]
pub fn crt_path(cert_dir: &Path, cluster_id: &str) -> PathBuf {
    cert_path(cert_dir, cluster_id, CertKind::Crt)
}

/// Path of the client key file of a guest cluster.
#[must_use]
pub fn key_path(cert_dir: &Path, cluster_id: &str) -> PathBuf {
    cert_path(cert_dir, cluster_id, CertKind::Key)
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod key_tests;
