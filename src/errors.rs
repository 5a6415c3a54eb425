// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Prometheus config controller.
//!
//! Every fallible operation in the library returns [`Error`]. Callers that need to
//! branch on the failure (retry policy, requeue policy, metrics labels) match on
//! [`Error::kind`] instead of inspecting messages.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Semantic category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required configuration value is missing or invalid
    InvalidConfig,
    /// The Prometheus ConfigMap does not exist
    ConfigMapNotFound,
    /// The Prometheus ConfigMap exists but lacks the configured data key
    ConfigMapKeyNotFound,
    /// The Prometheus ConfigMap payload is not a valid Prometheus YAML document
    InvalidConfigMap,
    /// Current and desired state disagree on the object name
    WrongName,
    /// Current and desired state disagree on the object namespace
    WrongNamespace,
    /// The minimum reload interval has not elapsed yet
    ReloadThrottle,
    /// An external collaborator answered with an unexpected result
    ExecutionFailed,
    /// The operation was cancelled
    Cancelled,
    /// Kubernetes API failure
    Kubernetes,
    /// HTTP transport failure
    Http,
    /// Local filesystem failure
    Io,
    /// YAML (de)serialization failure
    Serialization,
}

impl ErrorKind {
    /// Stable snake_case name used in metric labels and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::ConfigMapNotFound => "configmap_not_found",
            ErrorKind::ConfigMapKeyNotFound => "configmap_key_not_found",
            ErrorKind::InvalidConfigMap => "invalid_configmap",
            ErrorKind::WrongName => "wrong_name",
            ErrorKind::WrongNamespace => "wrong_namespace",
            ErrorKind::ReloadThrottle => "reload_throttle",
            ErrorKind::ExecutionFailed => "execution_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Kubernetes => "kubernetes",
            ErrorKind::Http => "http",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the controller.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration detected at construction time
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The target ConfigMap does not exist
    #[error("configmap {namespace}/{name} not found")]
    ConfigMapNotFound {
        /// Namespace of the ConfigMap
        namespace: String,
        /// Name of the ConfigMap
        name: String,
    },

    /// The target ConfigMap has no entry for the configured key
    #[error("key '{key}' not found in configmap {namespace}/{name}")]
    ConfigMapKeyNotFound {
        /// Namespace of the ConfigMap
        namespace: String,
        /// Name of the ConfigMap
        name: String,
        /// Missing data key
        key: String,
    },

    /// The ConfigMap payload does not parse as a Prometheus configuration
    #[error("invalid prometheus config in configmap {namespace}/{name}: {reason}")]
    InvalidConfigMap {
        /// Namespace of the ConfigMap
        namespace: String,
        /// Name of the ConfigMap
        name: String,
        /// Parser message
        reason: String,
    },

    /// Current and desired state name different objects
    #[error("wrong name: current '{current}', desired '{desired}'")]
    WrongName {
        /// Name in the current state
        current: String,
        /// Name in the desired state
        desired: String,
    },

    /// Current and desired state live in different namespaces
    #[error("wrong namespace: current '{current}', desired '{desired}'")]
    WrongNamespace {
        /// Namespace in the current state
        current: String,
        /// Namespace in the desired state
        desired: String,
    },

    /// Prometheus was reloaded too recently
    #[error("reload throttled, next reload possible in {remaining:?}")]
    ReloadThrottle {
        /// Time left until the minimum reload interval has elapsed
        remaining: Duration,
    },

    /// Unexpected answer from an external collaborator
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The surrounding cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Kubernetes API error
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// YAML error outside of ConfigMap parsing
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem error
    #[error("io error on {}: {source}", path.display())]
    Io {
        /// Path the operation was performed on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Semantic category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::ConfigMapNotFound { .. } => ErrorKind::ConfigMapNotFound,
            Error::ConfigMapKeyNotFound { .. } => ErrorKind::ConfigMapKeyNotFound,
            Error::InvalidConfigMap { .. } => ErrorKind::InvalidConfigMap,
            Error::WrongName { .. } => ErrorKind::WrongName,
            Error::WrongNamespace { .. } => ErrorKind::WrongNamespace,
            Error::ReloadThrottle { .. } => ErrorKind::ReloadThrottle,
            Error::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Kube(_) => ErrorKind::Kubernetes,
            Error::Http(_) => ErrorKind::Http,
            Error::Yaml(_) => ErrorKind::Serialization,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether re-invoking the failed step right away may succeed.
    ///
    /// Configuration problems, programming errors, throttling and cancellation are
    /// left to the next reconciliation instead.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ExecutionFailed | ErrorKind::Kubernetes | ErrorKind::Http | ErrorKind::Io
        )
    }

    /// Build an [`Error::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
