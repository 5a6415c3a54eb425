// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciled resources.
//!
//! A resource observes its current state, computes its desired state, diffs the two
//! into a [`Patch`] and applies it. Resources are driven through the object-safe
//! [`Step`] trait so that a reconciler can hold an ordered list of heterogeneous
//! resources.
//!
//! # Resources
//!
//! - [`certificate`] - TLS files under the certificate directory
//! - [`configmap`] - The Prometheus configuration ConfigMap
//! - [`reload`] - Prometheus hot reload, without any state of its own
//!
//! Deletion is never part of a patch: the certificate resource removes extra files as
//! part of its update, and the ConfigMap is never deleted.

pub mod certificate;
pub mod configmap;
pub mod reload;

pub use certificate::{CertFile, CertFileSet, CertificateResource};
pub use configmap::{ConfigMapResource, PromConfigMap};
pub use reload::ReloadResource;

use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Change computed from a current and a desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch<S> {
    /// State to create, when the object does not exist yet
    pub create: Option<S>,
    /// State to converge an existing object to
    pub update: Option<S>,
}

impl<S> Patch<S> {
    /// A patch that changes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            create: None,
            update: None,
        }
    }

    /// A patch updating the object to `state`.
    #[must_use]
    pub fn update(state: S) -> Self {
        Self {
            create: None,
            update: Some(state),
        }
    }

    /// Whether applying this patch is a no-op.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.update.is_none()
    }
}

/// Result of a successfully applied step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The resource is converged.
    Done,
    /// The resource is not converged yet and must be revisited after the given delay.
    KeepFinalizer(Duration),
}

impl StepOutcome {
    /// Combine the outcomes of two steps of one reconciliation, keeping the earliest
    /// revisit.
    #[must_use]
    pub fn and(self, other: StepOutcome) -> StepOutcome {
        match (self, other) {
            (StepOutcome::KeepFinalizer(a), StepOutcome::KeepFinalizer(b)) => {
                StepOutcome::KeepFinalizer(a.min(b))
            }
            (StepOutcome::KeepFinalizer(a), StepOutcome::Done)
            | (StepOutcome::Done, StepOutcome::KeepFinalizer(a)) => StepOutcome::KeepFinalizer(a),
            (StepOutcome::Done, StepOutcome::Done) => StepOutcome::Done,
        }
    }
}

/// A resource with typed current and desired states.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// State observed and desired for this resource.
    type State: Send + Sync;

    /// Name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Observe the state as it is now.
    async fn current(&self) -> Result<Self::State>;

    /// Compute the state the resource should be in.
    async fn desired(&self) -> Result<Self::State>;

    /// Diff `current` against `desired`.
    fn patch(&self, current: &Self::State, desired: Self::State) -> Result<Patch<Self::State>>;

    /// Apply `patch`. Receives the cancellation token for calls that must observe it.
    async fn apply(
        &self,
        patch: Patch<Self::State>,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome>;
}

/// One unit of work of a reconciliation.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Run the step once.
    async fn run(&self, cancel: &CancellationToken) -> Result<StepOutcome>;
}

/// [`Step`] running the observe, diff, apply cycle of a [`ManagedResource`].
pub struct ResourceStep<R> {
    resource: R,
}

impl<R: ManagedResource> ResourceStep<R> {
    /// Wrap `resource`.
    pub fn new(resource: R) -> Self {
        Self { resource }
    }

    /// The wrapped resource.
    pub fn resource(&self) -> &R {
        &self.resource
    }
}

#[async_trait]
impl<R: ManagedResource> Step for ResourceStep<R> {
    fn name(&self) -> &'static str {
        self.resource.name()
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<StepOutcome> {
        let name = self.resource.name();

        let (current, desired) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            states = async {
                let current = self.resource.current().await?;
                let desired = self.resource.desired().await?;
                Ok::<_, Error>((current, desired))
            } => states?,
        };

        let patch = self.resource.patch(&current, desired)?;
        debug!(resource = name, empty = patch.is_empty(), "Computed patch");

        self.resource.apply(patch, cancel).await
    }
}
