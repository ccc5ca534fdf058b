//! Progress monitoring for a dispatched batch
//!
//! Subscribes to the batch's snapshot channel and falls back to interval
//! polling when nothing changes. Rendering is monotonic: the reported
//! percentage never moves backwards even if underlying reads race. The loop
//! is bounded by an attempt budget and never blocks indefinitely.

use crate::application::batch::BatchHandle;
use crate::domain::batch::BatchSnapshot;
use std::time::Duration;
use tracing::{info, warn};

pub struct ProgressMonitor {
    poll_interval: Duration,
    max_attempts: u32,
}

impl ProgressMonitor {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self { poll_interval, max_attempts: max_attempts.max(1) }
    }

    /// Observe the batch until it reaches a terminal state or the attempt
    /// budget runs out, logging each rendered snapshot. Returns the last
    /// snapshot either way.
    pub async fn monitor(&self, handle: &BatchHandle) -> BatchSnapshot {
        self.monitor_with(handle, |snapshot, percentage| {
            info!(
                batch_id = %snapshot.batch_id,
                progress = format!("{percentage:.1}%"),
                pending = snapshot.pending_units,
                failed = snapshot.failed_units,
                total = snapshot.total_units,
                "Batch progress"
            );
        })
        .await
    }

    /// Same loop with an injected renderer; the callback receives the
    /// monotonic percentage alongside the raw snapshot.
    pub async fn monitor_with<F>(&self, handle: &BatchHandle, mut render: F) -> BatchSnapshot
    where
        F: FnMut(&BatchSnapshot, f64),
    {
        let mut rx = handle.subscribe();
        let mut last_percentage: f64 = 0.0;

        for attempt in 0..self.max_attempts {
            let snapshot = rx.borrow().clone();
            last_percentage = last_percentage.max(snapshot.progress_percentage());
            render(&snapshot, last_percentage);

            if snapshot.is_terminal() {
                return snapshot;
            }
            if attempt + 1 == self.max_attempts {
                break;
            }
            // Wake on the next published snapshot, or poll after the
            // interval elapses with no change.
            let _ = tokio::time::timeout(self.poll_interval, rx.changed()).await;
        }

        let snapshot = handle.snapshot();
        warn!(
            batch_id = %snapshot.batch_id,
            attempts = self.max_attempts,
            pending = snapshot.pending_units,
            "Progress monitor attempt budget exhausted; reporting partial snapshot"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::batch::{BatchCoordinator, RecordProcessor};
    use crate::domain::entities::{SourceRecord, UpsertOutcome};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn record(title: &str) -> SourceRecord {
        SourceRecord {
            id: 1,
            title: title.to_string(),
            price: 1.0,
            description: String::new(),
            image: String::new(),
            category: "c".to_string(),
            rating: None,
        }
    }

    struct SlowProcessor {
        delay: Duration,
    }

    #[async_trait]
    impl RecordProcessor for SlowProcessor {
        async fn process(&self, _record: &SourceRecord) -> Result<UpsertOutcome> {
            tokio::time::sleep(self.delay).await;
            Ok(UpsertOutcome::Created)
        }
    }

    #[tokio::test]
    async fn rendered_percentage_is_monotonic_and_reaches_terminal() {
        let coordinator = BatchCoordinator::new(
            Arc::new(SlowProcessor { delay: Duration::from_millis(5) }),
            1,
        );
        let handle = coordinator.submit(vec![record("A"), record("B"), record("C")], 1);

        let monitor = ProgressMonitor::new(Duration::from_millis(10), 1000);
        let mut rendered = Vec::new();
        let snapshot = monitor.monitor_with(&handle, |_, pct| rendered.push(pct)).await;

        assert!(snapshot.finished);
        assert!(rendered.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*rendered.last().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn cancelled_batch_is_observed_until_drained() {
        let coordinator = BatchCoordinator::new(
            Arc::new(SlowProcessor { delay: Duration::from_millis(5) }),
            1,
        );
        let handle = coordinator.submit(vec![record("A"), record("B"), record("C")], 1);
        handle.cancel();

        let monitor = ProgressMonitor::new(Duration::from_millis(10), 1000);
        let snapshot = monitor.monitor(&handle).await;

        // Cancellation alone is not terminal; the monitor returns once
        // every unit has resolved and the counters are settled.
        assert!(snapshot.cancelled);
        assert!(snapshot.finished);
        assert_eq!(snapshot.pending_units, 0);
        let counts = handle.counts();
        assert_eq!(counts.created + counts.skipped, 3);
    }

    #[tokio::test]
    async fn attempt_budget_bounds_the_loop() {
        let coordinator = BatchCoordinator::new(
            Arc::new(SlowProcessor { delay: Duration::from_secs(60) }),
            1,
        );
        let handle = coordinator.submit(vec![record("A")], 1);

        let monitor = ProgressMonitor::new(Duration::from_millis(5), 3);
        let snapshot = monitor.monitor(&handle).await;

        // Budget exhausted on a still-running batch: partial snapshot
        assert!(!snapshot.is_terminal());
        assert_eq!(snapshot.pending_units, 1);
        handle.cancel();
    }
}
