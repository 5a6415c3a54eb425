// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation worker loop.
//!
//! [`run_loop`] feeds trigger events into a [`Reconciler`] until the cancellation
//! token fires. Reconciliations that are not converged yet are revisited:
//!
//! - [`StepOutcome::KeepFinalizer`] requeues after the requested delay
//! - only the earliest requeue of a loop is kept, so revisits never pile up
//! - an error requeues after the next interval of an exponential backoff, which is
//!   reset by the next successful reconciliation
//! - cancellation is not requeued

use crate::constants::RECONCILE_WORKERS;
use crate::errors::Error;
use crate::informer::TriggerEvent;
use crate::reconciler::Reconciler;
use crate::resources::StepOutcome;
use crate::retry::default_backoff;
use futures::channel::mpsc;
use futures::{stream, Stream, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pending revisit of one loop.
///
/// At most one requeue is pending at a time. Scheduling a later revisit while one is
/// pending is a no-op; scheduling an earlier one replaces it.
struct Requeue {
    tx: mpsc::UnboundedSender<TriggerEvent>,
    pending: Mutex<Option<Instant>>,
}

impl Requeue {
    fn new(tx: mpsc::UnboundedSender<TriggerEvent>) -> Arc<Self> {
        Arc::new(Self {
            tx,
            pending: Mutex::new(None),
        })
    }

    /// Send a [`TriggerEvent::Requeue`] after `delay`, unless `cancel` fires first.
    fn schedule(self: &Arc<Self>, delay: Duration, cancel: CancellationToken) {
        let deadline = Instant::now() + delay;
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.is_some_and(|scheduled| scheduled <= deadline) {
                debug!(after = ?delay, "Earlier requeue already pending");
                return;
            }
            *pending = Some(deadline);
        }

        let requeue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => requeue.fire(deadline),
            }
        });
    }

    fn fire(&self, deadline: Instant) {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            // Superseded by an earlier deadline that already fired or is still pending.
            if *pending != Some(deadline) {
                return;
            }
            *pending = None;
        }

        if self.tx.unbounded_send(TriggerEvent::Requeue).is_err() {
            debug!("Reconciliation loop stopped, dropping requeue");
        }
    }
}

/// Run `reconciler` for every event of `triggers` until `cancel` fires.
pub async fn run_loop<S>(reconciler: Arc<Reconciler>, triggers: S, cancel: CancellationToken)
where
    S: Stream<Item = TriggerEvent> + Send,
{
    let name = reconciler.name();
    info!(reconciler = name, workers = RECONCILE_WORKERS, "Starting reconciliation loop");

    let (requeue_tx, requeue_rx) = mpsc::unbounded();
    let requeue = Requeue::new(requeue_tx);
    let backoff = Mutex::new(default_backoff());

    let stopped = cancel.clone();
    let events = stream::select(triggers, requeue_rx)
        .take_until(async move { stopped.cancelled().await });

    events
        .for_each_concurrent(RECONCILE_WORKERS, |event| {
            let reconciler = reconciler.clone();
            let requeue = requeue.clone();
            let cancel = cancel.clone();
            let backoff = &backoff;

            async move {
                debug!(reconciler = name, event = ?event, "Reconciliation triggered");

                match reconciler.reconcile(&cancel).await {
                    Ok(StepOutcome::Done) => {
                        backoff
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .reset();
                    }
                    Ok(StepOutcome::KeepFinalizer(after)) => {
                        backoff
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .reset();
                        debug!(reconciler = name, after = ?after, "Revisiting reconciliation");
                        requeue.schedule(after, cancel);
                    }
                    Err(Error::Cancelled) => {
                        debug!(reconciler = name, "Reconciliation cancelled, not requeueing");
                    }
                    Err(e) => {
                        let delay = {
                            let mut backoff =
                                backoff.lock().unwrap_or_else(PoisonError::into_inner);
                            // Once exhausted, keep retrying at the longest interval.
                            backoff.next_backoff().unwrap_or(backoff.max_interval)
                        };
                        warn!(
                            reconciler = name,
                            error = %e,
                            retry_after = ?delay,
                            "Reconciliation failed, requeueing"
                        );
                        requeue.schedule(delay, cancel);
                    }
                }
            }
        })
        .await;

    info!(reconciler = name, "Reconciliation loop stopped");
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
