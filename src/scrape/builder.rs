// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generation of scrape configs from guest cluster services.

use super::relabel;
use super::types::{
    KubernetesSdConfig, RelabelConfig, Scheme, ScrapeConfig, SdRole, StaticConfig, TlsConfig,
};
use crate::key;
use crate::labels::{CLUSTER_ID_LABEL, CLUSTER_TYPE_LABEL, GUEST_CLUSTER_TYPE};
use k8s_openapi::api::core::v1::Service;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

/// Kinds of scrape jobs emitted per guest cluster, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Guest cluster API server
    Apiserver,
    /// Container metrics of every node
    Cadvisor,
    /// Kubelet of every node
    Kubelet,
    /// node-exporter daemonset
    NodeExporter,
    /// Opted-in workloads of the monitored namespaces
    Workload,
    /// etcd, only when the service carries an etcd domain
    Etcd,
}

impl JobKind {
    /// Kinds emitted for every guest cluster.
    pub const ALWAYS: [JobKind; 5] = [
        JobKind::Apiserver,
        JobKind::Cadvisor,
        JobKind::Kubelet,
        JobKind::NodeExporter,
        JobKind::Workload,
    ];

    /// Suffix of the job name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Apiserver => "apiserver",
            JobKind::Cadvisor => "cadvisor",
            JobKind::Kubelet => "kubelet",
            JobKind::NodeExporter => "node-exporter",
            JobKind::Workload => "workload",
            JobKind::Etcd => "etcd",
        }
    }

    fn scheme(self) -> Scheme {
        match self {
            JobKind::NodeExporter => Scheme::Http,
            _ => Scheme::Https,
        }
    }

    /// API server and kubelets present self-signed serving certificates.
    fn insecure_skip_verify(self) -> bool {
        matches!(self, JobKind::Apiserver | JobKind::Kubelet)
    }

    fn sd_role(self) -> Option<SdRole> {
        match self {
            JobKind::Apiserver | JobKind::NodeExporter | JobKind::Workload => {
                Some(SdRole::Endpoints)
            }
            JobKind::Cadvisor | JobKind::Kubelet => Some(SdRole::Node),
            JobKind::Etcd => None,
        }
    }
}

/// Per-service inputs shared by all jobs of one guest cluster.
struct ClusterTarget<'a> {
    cluster_id: &'a str,
    namespace: &'a str,
    api_server_host: String,
    api_server_url: String,
    etcd_domain: Option<&'a str>,
}

/// Build the scrape configs for every valid guest cluster service.
///
/// Services without the cluster annotation or with a deletion timestamp are skipped.
/// Job names derive from the namespace, so only the first valid service of each
/// namespace is used. The result is sorted by job name, so equal inputs always
/// serialize to equal YAML.
#[must_use]
pub fn build_scrape_configs(services: &[Service], cert_dir: &Path) -> Vec<ScrapeConfig> {
    let mut namespaces = BTreeSet::new();
    let mut configs: Vec<ScrapeConfig> = services
        .iter()
        .filter_map(|service| {
            let cluster_id = key::cluster_id(service)?;
            key::is_valid_service(service).then(|| ClusterTarget {
                cluster_id,
                namespace: key::service_namespace(service),
                api_server_host: key::api_server_host(service),
                api_server_url: key::api_server_url(service),
                etcd_domain: key::etcd_domain(service),
            })
        })
        .filter(|target| {
            let first = namespaces.insert(target.namespace);
            if !first {
                warn!(
                    namespace = %target.namespace,
                    cluster_id = %target.cluster_id,
                    "Another master service of this namespace already produced its jobs, skipping"
                );
            }
            first
        })
        .flat_map(|target| jobs_for_cluster(&target, cert_dir))
        .collect();

    configs.sort_by(|a, b| a.job_name.cmp(&b.job_name));
    configs
}

fn jobs_for_cluster(target: &ClusterTarget<'_>, cert_dir: &Path) -> Vec<ScrapeConfig> {
    let mut jobs: Vec<ScrapeConfig> = JobKind::ALWAYS
        .iter()
        .map(|kind| scrape_config(*kind, target, cert_dir))
        .collect();

    if target.etcd_domain.is_some() {
        jobs.push(scrape_config(JobKind::Etcd, target, cert_dir));
    }

    jobs
}

fn tls_config(cluster_id: &str, cert_dir: &Path, insecure_skip_verify: bool) -> TlsConfig {
    TlsConfig {
        ca_file: key::ca_path(cert_dir, cluster_id).display().to_string(),
        cert_file: key::crt_path(cert_dir, cluster_id).display().to_string(),
        key_file: key::key_path(cert_dir, cluster_id).display().to_string(),
        insecure_skip_verify,
    }
}

fn scrape_config(kind: JobKind, target: &ClusterTarget<'_>, cert_dir: &Path) -> ScrapeConfig {
    let cluster_id = target.cluster_id;
    let scheme = kind.scheme();

    let tls = match scheme {
        Scheme::Https => Some(tls_config(cluster_id, cert_dir, kind.insecure_skip_verify())),
        Scheme::Http => None,
    };

    let kubernetes_sd_configs = kind
        .sd_role()
        .map(|role| KubernetesSdConfig {
            api_server: target.api_server_url.clone(),
            role,
            tls_config: tls_config(cluster_id, cert_dir, false),
        })
        .into_iter()
        .collect();

    let static_configs = match (kind, target.etcd_domain) {
        (JobKind::Etcd, Some(domain)) => vec![StaticConfig {
            targets: vec![domain.to_string()],
            labels: BTreeMap::from([
                (CLUSTER_ID_LABEL.to_string(), cluster_id.to_string()),
                (CLUSTER_TYPE_LABEL.to_string(), GUEST_CLUSTER_TYPE.to_string()),
            ]),
        }],
        _ => Vec::new(),
    };

    let (relabel_configs, metric_relabel_configs) = relabel_chains(kind, target);

    ScrapeConfig {
        job_name: key::job_name(target.namespace, kind.as_str()),
        scheme,
        tls_config: tls,
        kubernetes_sd_configs,
        static_configs,
        relabel_configs,
        metric_relabel_configs,
    }
}

fn relabel_chains(
    kind: JobKind,
    target: &ClusterTarget<'_>,
) -> (Vec<RelabelConfig>, Vec<RelabelConfig>) {
    let cluster_id = target.cluster_id;
    match kind {
        JobKind::Apiserver => (relabel::apiserver(cluster_id), relabel::apiserver_metrics()),
        JobKind::Cadvisor => (
            relabel::cadvisor(cluster_id, &target.api_server_host),
            relabel::cadvisor_metrics(),
        ),
        JobKind::Kubelet => (relabel::kubelet(cluster_id), relabel::kubelet_metrics()),
        JobKind::NodeExporter => (
            relabel::node_exporter(cluster_id),
            relabel::node_exporter_metrics(),
        ),
        JobKind::Workload => (
            relabel::workload(cluster_id, &target.api_server_host),
            relabel::workload_metrics(),
        ),
        JobKind::Etcd => (relabel::etcd(), relabel::etcd_metrics()),
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
