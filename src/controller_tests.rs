// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `controller.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::Result;
    use crate::informer::artificial_ticks;
    use crate::resources::Step;
    use crate::test_support::RecordingTelemetry;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Step replaying scripted results, then succeeding.
    struct CountingStep {
        runs: Arc<AtomicUsize>,
        script: Mutex<VecDeque<Result<StepOutcome>>>,
    }

    #[async_trait]
    impl Step for CountingStep {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _cancel: &CancellationToken) -> Result<StepOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or(Ok(StepOutcome::Done))
        }
    }

    fn reconciler(script: Vec<Result<StepOutcome>>) -> (Arc<Reconciler>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let step = CountingStep {
            runs: runs.clone(),
            script: Mutex::new(script.into()),
        };
        let reconciler = Reconciler::new(
            "test",
            vec![Box::new(step)],
            0,
            Arc::new(RecordingTelemetry::new()),
        );
        (Arc::new(reconciler), runs)
    }

    /// One trigger, then silence.
    fn single_trigger() -> impl Stream<Item = TriggerEvent> + Send {
        stream::iter([TriggerEvent::Tick]).chain(stream::pending::<TriggerEvent>())
    }

    async fn wait_for_runs(runs: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reconciliation ran in time");
    }

    #[tokio::test]
    async fn test_every_trigger_reconciles() {
        let (reconciler, runs) = reconciler(vec![]);
        let cancel = CancellationToken::new();
        let triggers = stream::iter([TriggerEvent::Tick, TriggerEvent::ConfigMap])
            .chain(stream::pending::<TriggerEvent>());

        let handle = tokio::spawn(run_loop(reconciler, triggers, cancel.clone()));
        wait_for_runs(&runs, 2).await;

        cancel.cancel();
        handle.await.expect("loop exits");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keep_finalizer_requeues() {
        let (reconciler, runs) = reconciler(vec![Ok(StepOutcome::KeepFinalizer(
            Duration::from_millis(20),
        ))]);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_loop(reconciler, single_trigger(), cancel.clone()));
        wait_for_runs(&runs, 2).await;

        cancel.cancel();
        handle.await.expect("loop exits");
    }

    #[tokio::test]
    async fn test_error_requeues_with_backoff() {
        let (reconciler, runs) = reconciler(vec![Err(Error::ExecutionFailed(
            "prometheus answered 503".to_string(),
        ))]);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_loop(reconciler, single_trigger(), cancel.clone()));
        wait_for_runs(&runs, 2).await;

        cancel.cancel();
        handle.await.expect("loop exits");
    }

    #[tokio::test]
    async fn test_converged_reconciliation_is_not_requeued() {
        let (reconciler, runs) = reconciler(vec![]);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_loop(reconciler, single_trigger(), cancel.clone()));
        wait_for_runs(&runs, 1).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        cancel.cancel();
        handle.await.expect("loop exits");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_loop() {
        let (reconciler, runs) = reconciler(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_loop(reconciler, stream::pending::<TriggerEvent>(), cancel),
        )
        .await
        .expect("loop exits once cancelled");
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    /// Step that is never converged, like a ConfigMap step behind a reload throttle.
    struct RevisitingStep {
        runs: Arc<AtomicUsize>,
        revisit: Duration,
    }

    #[async_trait]
    impl Step for RevisitingStep {
        fn name(&self) -> &'static str {
            "revisiting"
        }

        async fn run(&self, _cancel: &CancellationToken) -> Result<StepOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(StepOutcome::KeepFinalizer(self.revisit))
        }
    }

    #[tokio::test]
    async fn test_pending_requeues_are_merged() {
        let runs = Arc::new(AtomicUsize::new(0));
        let step = RevisitingStep {
            runs: runs.clone(),
            revisit: Duration::from_millis(100),
        };
        let reconciler = Arc::new(Reconciler::new(
            "test",
            vec![Box::new(step)],
            0,
            Arc::new(RecordingTelemetry::new()),
        ));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_loop(
            reconciler,
            artificial_ticks(Duration::from_millis(50)),
            cancel.clone(),
        ));

        // About 20 ticks and 10 revisits per second; unmerged revisits multiply.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let first_second = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second_second = runs.load(Ordering::SeqCst) - first_second;

        cancel.cancel();
        handle.await.expect("loop exits");

        assert!(first_second <= 45, "{first_second} reconciliations in the first second");
        assert!(second_second <= 45, "{second_second} reconciliations in the second second");
    }

    #[tokio::test]
    async fn test_earlier_requeue_replaces_later_one() {
        let (tx, mut rx) = mpsc::unbounded();
        let requeue = Requeue::new(tx);
        let cancel = CancellationToken::new();

        requeue.schedule(Duration::from_millis(40), cancel.clone());
        requeue.schedule(Duration::from_millis(200), cancel.clone());
        requeue.schedule(Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut fired = 0;
        while let Ok(Some(event)) = rx.try_next() {
            assert_eq!(event, TriggerEvent::Requeue);
            fired += 1;
        }
        assert_eq!(fired, 1);

        requeue.schedule(Duration::from_millis(10), cancel);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(rx.try_next(), Ok(Some(TriggerEvent::Requeue))));
    }
}

