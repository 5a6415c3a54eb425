// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants.
//!
//! Kubernetes labels and annotations this controller reads from the host cluster,
//! plus the Prometheus label names that appear in generated scrape configs.

// ============================================================================
// Host Cluster Labels
// ============================================================================

/// Label key identifying master services
pub const APP_LABEL: &str = "app";

/// Label value identifying master services
pub const APP_MASTER: &str = "master";

/// Label key of certificate secrets naming the component they were issued for
pub const CLUSTER_COMPONENT_LABEL: &str = "clusterComponent";

/// Label key of certificate secrets naming the guest cluster
pub const CLUSTER_ID_SECRET_LABEL: &str = "clusterID";

// ============================================================================
// Host Cluster Annotations
// ============================================================================

/// Annotation carrying the guest cluster id of a master service
pub const CLUSTER_ANNOTATION: &str = "giantswarm.io/prometheus-cluster";

/// Annotation carrying the `host:port` etcd target of a guest cluster
pub const ETCD_DOMAIN_ANNOTATION: &str = "giantswarm.io/etcd-domain";

// ============================================================================
// Certificate Secret Data Keys
// ============================================================================

/// Secret data key of the CA certificate
pub const SECRET_CA_KEY: &str = "ca";

/// Secret data key of the client certificate
pub const SECRET_CRT_KEY: &str = "crt";

/// Secret data key of the client private key
pub const SECRET_KEY_KEY: &str = "key";

// ============================================================================
// Prometheus Target Labels
// ============================================================================

/// Target label carrying the guest cluster id
pub const CLUSTER_ID_LABEL: &str = "cluster_id";

/// Target label carrying the cluster type
pub const CLUSTER_TYPE_LABEL: &str = "cluster_type";

/// Value of [`CLUSTER_TYPE_LABEL`] for every generated job
pub const GUEST_CLUSTER_TYPE: &str = "guest";

/// Target label naming the scraped application
pub const TARGET_APP_LABEL: &str = "app";

/// Target label carrying a node's internal IP
pub const IP_LABEL: &str = "ip";

/// Target label carrying the node a pod runs on
pub const NODE_LABEL: &str = "node";

/// Target label carrying the namespace of a workload
pub const NAMESPACE_LABEL: &str = "namespace";

/// Label kube-state-metrics style exporters end up with after a namespace collision
pub const EXPORTED_NAMESPACE_LABEL: &str = "exported_namespace";

/// Target label carrying a workload's pod name
pub const POD_NAME_LABEL: &str = "pod_name";

/// Filesystem type label of node-exporter series
pub const FSTYPE_LABEL: &str = "fstype";

/// Systemd unit state label of node-exporter series
pub const STATE_LABEL: &str = "state";

/// Systemd unit name label of node-exporter series
pub const NAME_LABEL: &str = "name";

// ============================================================================
// Prometheus Internal Labels
// ============================================================================

/// Scrape address of a target
pub const ADDRESS_LABEL: &str = "__address__";

/// HTTP path a target is scraped on
pub const METRICS_PATH_LABEL: &str = "__metrics_path__";

/// Metric name of a sample
pub const METRIC_NAME_LABEL: &str = "__name__";

// ============================================================================
// Kubernetes Service Discovery Meta Labels
// ============================================================================

/// Namespace of the discovered service
pub const META_SERVICE_NAMESPACE: &str = "__meta_kubernetes_service_namespace";

/// Name of the discovered service
pub const META_SERVICE_NAME: &str = "__meta_kubernetes_service_name";

/// `giantswarm.io/monitoring` label of the discovered service
pub const META_SERVICE_LABEL_MONITORING: &str =
    "__meta_kubernetes_service_label_giantswarm_io_monitoring";

/// Namespace of the discovered endpoint object
pub const META_NAMESPACE: &str = "__meta_kubernetes_namespace";

/// Name of the pod backing a discovered endpoint
pub const META_POD_NAME: &str = "__meta_kubernetes_pod_name";

/// Node of the pod backing a discovered endpoint
pub const META_POD_NODE_NAME: &str = "__meta_kubernetes_pod_node_name";

/// Container port number of a discovered endpoint
pub const META_POD_CONTAINER_PORT_NUMBER: &str = "__meta_kubernetes_pod_container_port_number";

/// Name of a discovered node
pub const META_NODE_NAME: &str = "__meta_kubernetes_node_name";

/// Internal IP of a discovered node
pub const META_NODE_ADDRESS_INTERNAL_IP: &str = "__meta_kubernetes_node_address_InternalIP";
