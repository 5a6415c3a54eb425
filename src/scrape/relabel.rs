// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Relabel and metric-relabel chains of the generated scrape jobs.
//!
//! The regular expressions, label names and replacement templates in this module are
//! consumed verbatim by Prometheus. Changing any of them changes the series ingested
//! for every guest cluster.

use super::types::RelabelConfig;
use crate::labels::{
    ADDRESS_LABEL, CLUSTER_ID_LABEL, CLUSTER_TYPE_LABEL, EXPORTED_NAMESPACE_LABEL, FSTYPE_LABEL,
    GUEST_CLUSTER_TYPE, IP_LABEL, META_NAMESPACE, META_NODE_ADDRESS_INTERNAL_IP, META_NODE_NAME,
    META_POD_CONTAINER_PORT_NUMBER, META_POD_NAME, META_POD_NODE_NAME, META_SERVICE_LABEL_MONITORING,
    META_SERVICE_NAME, META_SERVICE_NAMESPACE, METRICS_PATH_LABEL, METRIC_NAME_LABEL,
    NAMESPACE_LABEL, NAME_LABEL, NODE_LABEL, POD_NAME_LABEL, STATE_LABEL, TARGET_APP_LABEL,
};

// ============================================================================
// Regular Expressions
// ============================================================================

/// Namespaces whose workloads are monitored.
pub const NS_REGEX: &str = "(kube-system|giantswarm.*|vault-exporter)";

/// `<service namespace>;<service name>` of the guest cluster API server.
pub const API_SERVER_REGEX: &str = "default;kubernetes";

/// `<service namespace>;<service name>` of node-exporter.
pub const NODE_EXPORTER_REGEX: &str = "kube-system;node-exporter";

/// Value of the monitoring label opting a service in to workload scraping.
pub const MONITORING_ENABLED_REGEX: &str = "true";

/// Matches any non-empty value and captures it.
pub const NON_EMPTY_REGEX: &str = "(.+)";

/// `<namespace>;<pod>;<port>` of a workload endpoint.
pub const WORKLOAD_ENDPOINT_REGEX: &str = "(.+);(.+);(.+)";

/// Reflector metrics exposed by every client-go binary.
pub const REFLECTOR_REGEX: &str = "reflector.*";

/// High-cardinality histogram buckets of the API server.
pub const API_SERVER_BUCKETS_REGEX: &str = "(apiserver_admission_controller_admission_latencies_seconds_bucket|apiserver_admission_step_admission_latencies_seconds_bucket|apiserver_request_latencies_bucket|apiserver_response_sizes_bucket|rest_client_request_latency_seconds_bucket)";

/// High-cardinality histogram buckets of the kubelet.
pub const KUBELET_BUCKETS_REGEX: &str = "(kubelet_docker_operations_latency_microseconds_bucket|kubelet_runtime_operations_latency_microseconds_bucket|rest_client_request_latency_seconds_bucket)";

/// Per-interface container network series.
pub const CONTAINER_NETWORK_REGEX: &str = "container_network_.*";

/// Pseudo filesystems reported by node-exporter.
pub const IGNORED_FSTYPE_REGEX: &str = "(cgroup|devpts|mqueue|nsfs|overlay|tmpfs)";

/// Non-failed systemd unit states.
pub const SYSTEMD_UNIT_STATE_REGEX: &str =
    "node_systemd_unit_state;(active|activating|deactivating|inactive)";

/// Transient systemd units.
pub const SYSTEMD_UNIT_NAME_REGEX: &str = "node_systemd_unit_state;(dev-.*|run-.*|var-lib-docker-.*|var-lib-kubelet-.*)\\.(device|mount|scope|swap)";

/// etcd debugging series.
pub const ETCD_DEBUGGING_REGEX: &str = "etcd_debugging_.*";

// ============================================================================
// Replacement Templates
// ============================================================================

/// Kubelet cAdvisor endpoint proxied through the API server.
pub const CADVISOR_METRICS_PATH: &str = "/api/v1/nodes/${1}/proxy/metrics/cadvisor";

/// Generic workload endpoint proxied through the API server.
pub const WORKLOAD_METRICS_PATH: &str = "/api/v1/namespaces/${1}/pods/${2}:${3}/proxy/metrics";

/// Workloads whose metrics port differs from the port their service exposes.
///
/// Tuples of `(namespace, service, metrics port)`.
pub const FIXED_PORT_WORKLOADS: [(&str, &str, u16); 2] = [
    ("kube-system", "kube-state-metrics", 10301),
    ("kube-system", "nginx-ingress-controller", 10254),
];

/// Pod proxy path of a workload in `namespace` listening on `port`.
///
/// The pod name is taken from the first regex group.
#[must_use]
pub fn pod_proxy_path(namespace: &str, port: u16) -> String {
    format!("/api/v1/namespaces/{namespace}/pods/${{1}}:{port}/proxy/metrics")
}

// ============================================================================
// Relabel Chains
// ============================================================================

fn cluster_labels(cluster_id: &str) -> [RelabelConfig; 2] {
    [
        RelabelConfig::set(CLUSTER_ID_LABEL, cluster_id),
        RelabelConfig::set(CLUSTER_TYPE_LABEL, GUEST_CLUSTER_TYPE),
    ]
}

/// Target relabeling of the API server job.
#[must_use]
pub fn apiserver(cluster_id: &str) -> Vec<RelabelConfig> {
    let mut rules = vec![
        RelabelConfig::keep(&[META_SERVICE_NAMESPACE, META_SERVICE_NAME], API_SERVER_REGEX),
        RelabelConfig::set(TARGET_APP_LABEL, "apiserver"),
    ];
    rules.extend(cluster_labels(cluster_id));
    rules
}

/// Target relabeling of the cAdvisor job, scraped through the API server node proxy.
#[must_use]
pub fn cadvisor(cluster_id: &str, api_server_host: &str) -> Vec<RelabelConfig> {
    let mut rules = vec![
        RelabelConfig::set(TARGET_APP_LABEL, "cadvisor"),
        RelabelConfig::set(ADDRESS_LABEL, api_server_host),
        RelabelConfig::rewrite(
            &[META_NODE_NAME],
            NON_EMPTY_REGEX,
            METRICS_PATH_LABEL,
            CADVISOR_METRICS_PATH,
        ),
        RelabelConfig::copy(META_NODE_ADDRESS_INTERNAL_IP, IP_LABEL),
    ];
    rules.extend(cluster_labels(cluster_id));
    rules
}

/// Target relabeling of the kubelet job.
#[must_use]
pub fn kubelet(cluster_id: &str) -> Vec<RelabelConfig> {
    let mut rules = vec![
        RelabelConfig::set(TARGET_APP_LABEL, "kubelet"),
        RelabelConfig::copy(META_NODE_ADDRESS_INTERNAL_IP, IP_LABEL),
    ];
    rules.extend(cluster_labels(cluster_id));
    rules
}

/// Target relabeling of the node-exporter job.
#[must_use]
pub fn node_exporter(cluster_id: &str) -> Vec<RelabelConfig> {
    let mut rules = vec![
        RelabelConfig::keep(
            &[META_SERVICE_NAMESPACE, META_SERVICE_NAME],
            NODE_EXPORTER_REGEX,
        ),
        RelabelConfig::set(TARGET_APP_LABEL, "node-exporter"),
        RelabelConfig::copy(META_POD_NODE_NAME, NODE_LABEL),
    ];
    rules.extend(cluster_labels(cluster_id));
    rules
}

/// Target relabeling of the workload job, scraped through the API server pod proxy.
#[must_use]
pub fn workload(cluster_id: &str, api_server_host: &str) -> Vec<RelabelConfig> {
    let mut rules = vec![
        RelabelConfig::keep(&[META_SERVICE_NAMESPACE], NS_REGEX),
        RelabelConfig::keep(&[META_SERVICE_LABEL_MONITORING], MONITORING_ENABLED_REGEX),
        RelabelConfig::drop(
            &[META_SERVICE_NAMESPACE, META_SERVICE_NAME],
            NODE_EXPORTER_REGEX,
        ),
        RelabelConfig::set(ADDRESS_LABEL, api_server_host),
        RelabelConfig::rewrite(
            &[META_NAMESPACE, META_POD_NAME, META_POD_CONTAINER_PORT_NUMBER],
            WORKLOAD_ENDPOINT_REGEX,
            METRICS_PATH_LABEL,
            WORKLOAD_METRICS_PATH,
        ),
    ];

    // Later rules win, so the fixed ports override the generic path above.
    rules.extend(
        FIXED_PORT_WORKLOADS
            .iter()
            .map(|(namespace, service, port)| {
                RelabelConfig::rewrite(
                    &[META_SERVICE_NAMESPACE, META_SERVICE_NAME, META_POD_NAME],
                    format!("{namespace};{service};(.+)"),
                    METRICS_PATH_LABEL,
                    pod_proxy_path(namespace, *port),
                )
            }),
    );

    rules.push(RelabelConfig::copy(META_SERVICE_NAME, TARGET_APP_LABEL));
    rules.push(RelabelConfig::copy(META_NAMESPACE, NAMESPACE_LABEL));
    rules.push(RelabelConfig::copy(META_POD_NAME, POD_NAME_LABEL));
    rules.extend(cluster_labels(cluster_id));
    rules
}

/// Target relabeling of the etcd job. Cluster labels come from the static config.
#[must_use]
pub fn etcd() -> Vec<RelabelConfig> {
    vec![RelabelConfig::set(TARGET_APP_LABEL, "etcd")]
}

// ============================================================================
// Metric Relabel Chains
// ============================================================================

/// Sample relabeling of the API server job.
#[must_use]
pub fn apiserver_metrics() -> Vec<RelabelConfig> {
    vec![
        RelabelConfig::drop(&[METRIC_NAME_LABEL], API_SERVER_BUCKETS_REGEX),
        RelabelConfig::drop(&[METRIC_NAME_LABEL], REFLECTOR_REGEX),
    ]
}

/// Sample relabeling of the cAdvisor job.
#[must_use]
pub fn cadvisor_metrics() -> Vec<RelabelConfig> {
    vec![
        RelabelConfig::drop(&[METRIC_NAME_LABEL], CONTAINER_NETWORK_REGEX),
        RelabelConfig::keep(&[NAMESPACE_LABEL], NS_REGEX),
    ]
}

/// Sample relabeling of the kubelet job.
#[must_use]
pub fn kubelet_metrics() -> Vec<RelabelConfig> {
    vec![
        RelabelConfig::drop(&[METRIC_NAME_LABEL], REFLECTOR_REGEX),
        RelabelConfig::drop(&[METRIC_NAME_LABEL], KUBELET_BUCKETS_REGEX),
    ]
}

/// Sample relabeling of the node-exporter job.
#[must_use]
pub fn node_exporter_metrics() -> Vec<RelabelConfig> {
    vec![
        RelabelConfig::drop(&[FSTYPE_LABEL], IGNORED_FSTYPE_REGEX),
        RelabelConfig::drop(&[METRIC_NAME_LABEL, STATE_LABEL], SYSTEMD_UNIT_STATE_REGEX),
        RelabelConfig::drop(&[METRIC_NAME_LABEL, NAME_LABEL], SYSTEMD_UNIT_NAME_REGEX),
    ]
}

/// Sample relabeling of the workload job.
///
/// Exporters reporting on other namespaces (kube-state-metrics) collide with the
/// target `namespace` label; their value is moved back before filtering.
#[must_use]
pub fn workload_metrics() -> Vec<RelabelConfig> {
    vec![
        RelabelConfig::rewrite(
            &[EXPORTED_NAMESPACE_LABEL],
            NON_EMPTY_REGEX,
            NAMESPACE_LABEL,
            "${1}",
        ),
        RelabelConfig::keep(&[NAMESPACE_LABEL], NS_REGEX),
        RelabelConfig::drop(&[METRIC_NAME_LABEL], REFLECTOR_REGEX),
    ]
}

/// Sample relabeling of the etcd job.
#[must_use]
pub fn etcd_metrics() -> Vec<RelabelConfig> {
    vec![RelabelConfig::drop(&[METRIC_NAME_LABEL], ETCD_DEBUGGING_REGEX)]
}
