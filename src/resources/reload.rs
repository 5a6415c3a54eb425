// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reload-only step.
//!
//! Converges Prometheus after a restart of either process, when the ConfigMap is
//! already up to date but Prometheus has not loaded it yet.

use super::{Step, StepOutcome};
use crate::errors::{Error, Result};
use crate::reloader::Reloader;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const RESOURCE_NAME: &str = "reload";

/// Reload Prometheus, turning a throttled reload into a delayed revisit.
pub(crate) async fn reload_prometheus(
    reloader: &Reloader,
    cancel: &CancellationToken,
) -> Result<StepOutcome> {
    match reloader.reload(cancel).await {
        Ok(_) => Ok(StepOutcome::Done),
        Err(Error::ReloadThrottle { remaining }) => Ok(StepOutcome::KeepFinalizer(remaining)),
        Err(e) => Err(e),
    }
}

/// Asks the [`Reloader`] to reload Prometheus if needed.
pub struct ReloadResource {
    reloader: Arc<Reloader>,
}

impl ReloadResource {
    pub fn new(reloader: Arc<Reloader>) -> Self {
        Self { reloader }
    }
}

#[async_trait]
impl Step for ReloadResource {
    fn name(&self) -> &'static str {
        RESOURCE_NAME
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<StepOutcome> {
        reload_prometheus(&self.reloader, cancel).await
    }
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod reload_tests;
