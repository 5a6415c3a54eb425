// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate files of guest clusters.
//!
//! For every guest cluster with a certificate secret, the `ca`, `crt` and `key`
//! entries of the secret are written to `<directory>/<cluster id>-<kind>.pem`. Any
//! other file in the directory is removed, so the directory always mirrors the set of
//! live guest clusters.

use super::{ManagedResource, Patch, StepOutcome};
use crate::config::CertificateConfig;
use crate::errors::{Error, Result};
use crate::key::{self, CertKind};
use crate::kubernetes::KubeApi;
use crate::metrics::{Telemetry, CERTIFICATE_FILES_REMOVED, CERTIFICATE_FILES_WRITTEN};
use crate::reloader::Reloader;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const RESOURCE_NAME: &str = "certificate";

/// One file on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CertFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// File content
    pub data: Vec<u8>,
}

/// Set of certificate files. Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct CertFileSet {
    files: Vec<CertFile>,
}

impl CertFileSet {
    /// Wrap `files`.
    #[must_use]
    pub fn new(files: Vec<CertFile>) -> Self {
        Self { files }
    }

    /// Files in insertion order.
    #[must_use]
    pub fn files(&self) -> &[CertFile] {
        &self.files
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set holds no file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether a file with `path` belongs to the set.
    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        self.files.iter().any(|file| file.path == path)
    }

    fn sorted(&self) -> Vec<&CertFile> {
        let mut files: Vec<&CertFile> = self.files.iter().collect();
        files.sort();
        files
    }
}

impl PartialEq for CertFileSet {
    fn eq(&self, other: &Self) -> bool {
        self.files.len() == other.files.len() && self.sorted() == other.sorted()
    }
}

impl Eq for CertFileSet {}

/// Mirrors certificate secrets of guest clusters into the certificate directory.
pub struct CertificateResource {
    kube: Arc<dyn KubeApi>,
    reloader: Arc<Reloader>,
    telemetry: Arc<dyn Telemetry>,
    component_name: String,
    directory: PathBuf,
    namespace: String,
    permission: u32,
}

impl CertificateResource {
    /// Create the resource for `config`.
    pub fn new(
        config: &CertificateConfig,
        kube: Arc<dyn KubeApi>,
        reloader: Arc<Reloader>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            kube,
            reloader,
            telemetry,
            component_name: config.component_name.clone(),
            directory: config.directory.clone(),
            namespace: config.namespace.clone(),
            permission: config.permission,
        }
    }

    /// Paths of the regular files currently in the certificate directory.
    async fn existing_paths(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.directory, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&self.directory, e))?
        {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| Error::io(&path, e))?;
            if file_type.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn cluster_files(&self, cluster_id: &str) -> Result<Vec<CertFile>> {
        let selector = key::certificate_secret_selector(&self.component_name, cluster_id);
        let secrets = self.kube.list_secrets(&self.namespace, &selector).await?;

        let Some(secret) = secrets.into_iter().next() else {
            warn!(
                cluster_id = %cluster_id,
                namespace = %self.namespace,
                selector = %selector,
                "No certificate secret found for guest cluster, skipping"
            );
            return Ok(Vec::new());
        };

        let mut data = secret.data.unwrap_or_default();
        Ok(CertKind::ALL
            .into_iter()
            .filter_map(|kind| {
                data.remove(kind.secret_key()).map(|bytes| CertFile {
                    path: key::cert_path(&self.directory, cluster_id, kind),
                    data: bytes.0,
                })
            })
            .collect())
    }

    async fn write_file(&self, file: &CertFile) -> Result<()> {
        // New files are created with the final mode; existing ones keep theirs until
        // set_permissions below.
        let mut handle = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(self.permission)
            .open(&file.path)
            .await
            .map_err(|e| Error::io(&file.path, e))?;
        handle
            .write_all(&file.data)
            .await
            .map_err(|e| Error::io(&file.path, e))?;
        handle.flush().await.map_err(|e| Error::io(&file.path, e))?;
        drop(handle);

        tokio::fs::set_permissions(&file.path, std::fs::Permissions::from_mode(self.permission))
            .await
            .map_err(|e| Error::io(&file.path, e))?;

        self.telemetry.inc(CERTIFICATE_FILES_WRITTEN, &[]);
        debug!(path = %file.path.display(), "Wrote certificate file");
        Ok(())
    }
}

#[async_trait]
impl ManagedResource for CertificateResource {
    type State = CertFileSet;

    fn name(&self) -> &'static str {
        RESOURCE_NAME
    }

    async fn current(&self) -> Result<CertFileSet> {
        let mut files = Vec::new();
        for path in self.existing_paths().await? {
            let data = tokio::fs::read(&path).await.map_err(|e| Error::io(&path, e))?;
            files.push(CertFile { path, data });
        }
        Ok(CertFileSet::new(files))
    }

    async fn desired(&self) -> Result<CertFileSet> {
        let services = self
            .kube
            .list_services(&key::master_service_selector())
            .await?;

        let cluster_ids: BTreeSet<&str> = services
            .iter()
            .filter(|service| key::is_valid_service(service))
            .filter_map(key::cluster_id)
            .collect();

        let mut files = Vec::new();
        for cluster_id in cluster_ids {
            files.extend(self.cluster_files(cluster_id).await?);
        }
        Ok(CertFileSet::new(files))
    }

    fn patch(&self, current: &CertFileSet, desired: CertFileSet) -> Result<Patch<CertFileSet>> {
        if *current == desired {
            return Ok(Patch::empty());
        }
        Ok(Patch::update(desired))
    }

    async fn apply(
        &self,
        patch: Patch<CertFileSet>,
        _cancel: &CancellationToken,
    ) -> Result<StepOutcome> {
        let Some(desired) = patch.update else {
            return Ok(StepOutcome::Done);
        };

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| Error::io(&self.directory, e))?;

        for file in desired.files() {
            self.write_file(file).await?;
        }

        let mut removed = 0;
        for path in self.existing_paths().await? {
            if desired.contains_path(&path) {
                continue;
            }
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| Error::io(&path, e))?;
            self.telemetry.inc(CERTIFICATE_FILES_REMOVED, &[]);
            debug!(path = %path.display(), "Removed certificate file");
            removed += 1;
        }

        info!(
            directory = %self.directory.display(),
            written = desired.len(),
            removed,
            "Certificate files updated"
        );
        self.reloader.request_reload();

        Ok(StepOutcome::Done)
    }
}

#[cfg(test)]
#[path = "certificate_tests.rs"]
mod certificate_tests;
