// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ordered execution of resource steps.
//!
//! A [`Reconciler`] runs its steps one after the other, each wrapped in the bounded
//! step retry of [`crate::retry::retry_step`]. The first failing step aborts the
//! reconciliation. Runs are serialised, so two triggers never interleave steps.

use crate::errors::{Error, Result};
use crate::metrics::{Telemetry, RECONCILIATIONS, RECONCILIATION_DURATION, RESOURCE_ERRORS};
use crate::resources::{Step, StepOutcome};
use crate::retry::retry_step;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Drives an ordered list of steps.
pub struct Reconciler {
    name: &'static str,
    steps: Vec<Box<dyn Step>>,
    resource_retries: usize,
    telemetry: Arc<dyn Telemetry>,
    run_lock: tokio::sync::Mutex<()>,
}

impl Reconciler {
    /// Create a reconciler named `name` running `steps` in order.
    ///
    /// Each step is re-invoked up to `resource_retries` times on retryable errors.
    pub fn new(
        name: &'static str,
        steps: Vec<Box<dyn Step>>,
        resource_retries: usize,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            name,
            steps,
            resource_retries,
            telemetry,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Name of this reconciler, used as the `loop` metric label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run every step once, in order.
    ///
    /// Returns [`StepOutcome::KeepFinalizer`] with the earliest requested revisit if
    /// any step is not converged yet.
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that fails after its retries, or
    /// [`Error::Cancelled`] if `cancel` fires.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<StepOutcome> {
        let _running = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.run_lock.lock() => guard,
        };

        let start = Instant::now();
        let result = self.run_steps(cancel).await;

        let status = match &result {
            Ok(StepOutcome::Done) => "success",
            Ok(StepOutcome::KeepFinalizer(_)) => "requeue",
            Err(Error::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        self.telemetry.inc(RECONCILIATIONS, &[self.name, status]);
        self.telemetry.observe(
            RECONCILIATION_DURATION,
            &[self.name],
            start.elapsed().as_secs_f64(),
        );

        match &result {
            Ok(outcome) => info!(
                reconciler = self.name,
                outcome = ?outcome,
                elapsed = ?start.elapsed(),
                "Reconciliation finished"
            ),
            Err(Error::Cancelled) => debug!(reconciler = self.name, "Reconciliation cancelled"),
            Err(e) => error!(
                reconciler = self.name,
                error = %e,
                kind = %e.kind(),
                "Reconciliation failed"
            ),
        }

        result
    }

    async fn run_steps(&self, cancel: &CancellationToken) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::Done;

        for step in &self.steps {
            debug!(reconciler = self.name, step = step.name(), "Running step");

            let step_outcome = retry_step(
                || step.run(cancel),
                step.name(),
                self.resource_retries,
                cancel,
            )
            .await
            .inspect_err(|e| {
                if !matches!(e, Error::Cancelled) {
                    self.telemetry
                        .inc(RESOURCE_ERRORS, &[step.name(), e.kind().as_str()]);
                }
            })?;

            outcome = outcome.and(step_outcome);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
