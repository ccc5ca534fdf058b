//! Batch coordination: chunking, dispatch, and completion tracking
//!
//! `submit` partitions the fetched record set into chunks and schedules every
//! record as an independently-completing unit of work under one batch
//! correlation id. Dispatch is fire-and-forget: the handle returns
//! immediately and a driver task resolves the batch's terminal state exactly
//! once. Units never depend on sibling ordering; one unit's failure is
//! counted and does not halt the rest.

use crate::domain::batch::BatchSnapshot;
use crate::domain::entities::{SourceRecord, UpsertOutcome};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Processing seam for one unit of work. The production implementation is
/// the upsert engine.
#[async_trait]
pub trait RecordProcessor: Send + Sync + 'static {
    async fn process(&self, record: &SourceRecord) -> Result<UpsertOutcome>;
}

/// Per-outcome counters accumulated by a batch. Authoritative source for
/// ledger stat updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

struct BatchInner {
    id: String,
    total: usize,
    pending: AtomicUsize,
    created: AtomicUsize,
    updated: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    finished: AtomicBool,
    cancel: CancellationToken,
    snapshot_tx: watch::Sender<BatchSnapshot>,
}

impl BatchInner {
    fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            batch_id: self.id.clone(),
            total_units: self.total,
            pending_units: self.pending.load(Ordering::Acquire),
            failed_units: self.failed.load(Ordering::Acquire),
            finished: self.finished.load(Ordering::Acquire),
            cancelled: self.cancel.is_cancelled(),
        }
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.snapshot());
    }
}

/// Live view of one dispatched batch.
#[derive(Clone)]
pub struct BatchHandle {
    inner: Arc<BatchInner>,
    snapshot_rx: watch::Receiver<BatchSnapshot>,
}

impl BatchHandle {
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.inner.snapshot()
    }

    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            created: self.inner.created.load(Ordering::Acquire),
            updated: self.inner.updated.load(Ordering::Acquire),
            skipped: self.inner.skipped.load(Ordering::Acquire),
            failed: self.inner.failed.load(Ordering::Acquire),
        }
    }

    /// Cooperative cancellation: not-yet-started units observe the flag and
    /// skip; in-flight units run to completion; nothing is rolled back.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Subscription to snapshot updates; polling `snapshot()` remains
    /// available as fallback.
    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until the batch reaches a terminal state. Used by tests and
    /// any caller that prefers blocking over the monitor's bounded loop.
    pub async fn wait_terminal(&self) -> BatchSnapshot {
        let mut rx = self.snapshot_rx.clone();
        loop {
            let snapshot = rx.borrow().clone();
            if snapshot.is_terminal() {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                return self.inner.snapshot();
            }
        }
    }
}

/// `ceil(total / chunk_size)` with a zero chunk size treated as 1.
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    let chunk_size = chunk_size.max(1);
    total.div_ceil(chunk_size)
}

pub struct BatchCoordinator {
    processor: Arc<dyn RecordProcessor>,
    concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(processor: Arc<dyn RecordProcessor>, concurrency: usize) -> Self {
        Self { processor, concurrency: concurrency.max(1) }
    }

    /// Partition `records` into chunks of at most `chunk_size` and dispatch
    /// every record as one unit of work. Returns the handle without waiting
    /// for completion.
    pub fn submit(&self, records: Vec<SourceRecord>, chunk_size: usize) -> BatchHandle {
        let chunk_size = chunk_size.max(1);
        let total = records.len();
        let batches = chunk_count(total, chunk_size);
        let batch_id = Uuid::new_v4().to_string();

        let (snapshot_tx, snapshot_rx) = watch::channel(BatchSnapshot::empty(batch_id.clone()));
        let inner = Arc::new(BatchInner {
            id: batch_id.clone(),
            total,
            pending: AtomicUsize::new(total),
            created: AtomicUsize::new(0),
            updated: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            snapshot_tx,
        });
        inner.publish();

        info!(
            batch_id = %batch_id,
            total_units = total,
            total_batches = batches,
            chunk_size,
            "Dispatching batch"
        );

        let driver_inner = inner.clone();
        let processor = self.processor.clone();
        let concurrency = self.concurrency;
        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(concurrency));
            let mut units: JoinSet<UpsertOutcome> = JoinSet::new();

            for (chunk_index, chunk) in records.chunks(chunk_size).enumerate() {
                debug!(
                    batch_id = %driver_inner.id,
                    chunk = chunk_index + 1,
                    of = batches,
                    size = chunk.len(),
                    "Scheduling chunk"
                );
                for record in chunk.iter().cloned() {
                    let semaphore = semaphore.clone();
                    let cancel = driver_inner.cancel.clone();
                    let processor = processor.clone();
                    units.spawn(async move {
                        let _permit = match semaphore.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return UpsertOutcome::Skipped,
                        };
                        // Cancellation is checked before any work; a
                        // cancelled unit has no side effects.
                        if cancel.is_cancelled() {
                            return UpsertOutcome::Skipped;
                        }
                        match processor.process(&record).await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                warn!(title = %record.title, error = %format!("{e:#}"), "Failed to process product");
                                UpsertOutcome::Failed
                            }
                        }
                    });
                }
            }

            while let Some(joined) = units.join_next().await {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(batch_id = %driver_inner.id, "Unit task panicked: {e}");
                        UpsertOutcome::Failed
                    }
                };
                match outcome {
                    UpsertOutcome::Created => driver_inner.created.fetch_add(1, Ordering::AcqRel),
                    UpsertOutcome::Updated => driver_inner.updated.fetch_add(1, Ordering::AcqRel),
                    UpsertOutcome::Skipped => driver_inner.skipped.fetch_add(1, Ordering::AcqRel),
                    UpsertOutcome::Failed => driver_inner.failed.fetch_add(1, Ordering::AcqRel),
                };
                driver_inner.pending.fetch_sub(1, Ordering::AcqRel);
                driver_inner.publish();
            }

            driver_inner.finished.store(true, Ordering::Release);
            driver_inner.publish();
            info!(
                batch_id = %driver_inner.id,
                failed = driver_inner.failed.load(Ordering::Acquire),
                cancelled = driver_inner.cancel.is_cancelled(),
                "Batch finished"
            );
        });

        BatchHandle { inner, snapshot_rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::OnceCell;

    #[rstest]
    #[case(0, 100, 0)]
    #[case(1, 100, 1)]
    #[case(100, 100, 1)]
    #[case(101, 100, 2)]
    #[case(2, 1, 2)]
    #[case(250, 100, 3)]
    #[case(5, 0, 5)]
    fn chunk_count_is_ceiling_division(
        #[case] total: usize,
        #[case] chunk_size: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(chunk_count(total, chunk_size), expected);
    }

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

    /// Processor that records processed titles and fails on demand.
    struct StubProcessor {
        processed: Mutex<Vec<String>>,
        fail_titles: HashSet<String>,
    }

    impl StubProcessor {
        fn new(fail_titles: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                processed: Mutex::new(Vec::new()),
                fail_titles: fail_titles.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    #[async_trait]
    impl RecordProcessor for StubProcessor {
        async fn process(&self, record: &SourceRecord) -> Result<UpsertOutcome> {
            self.processed.lock().unwrap().push(record.title.clone());
            if self.fail_titles.contains(&record.title) {
                anyhow::bail!("storage failure");
            }
            Ok(UpsertOutcome::Created)
        }
    }

    #[tokio::test]
    async fn all_units_complete_and_batch_finishes() {
        let processor = StubProcessor::new(&[]);
        let coordinator = BatchCoordinator::new(processor.clone(), 4);

        let records = vec![record("A"), record("B")];
        let handle = coordinator.submit(records, 1);

        let snapshot = handle.wait_terminal().await;
        assert!(snapshot.finished);
        assert!(!snapshot.cancelled);
        assert_eq!(snapshot.total_units, 2);
        assert_eq!(snapshot.pending_units, 0);
        assert_eq!(snapshot.failed_units, 0);
        assert_eq!(snapshot.progress_percentage(), 100.0);

        assert_eq!(handle.counts().created, 2);
        assert_eq!(processor.processed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_halt_siblings() {
        let processor = StubProcessor::new(&["B"]);
        let coordinator = BatchCoordinator::new(processor.clone(), 2);

        let handle = coordinator.submit(vec![record("A"), record("B"), record("C")], 2);
        let snapshot = handle.wait_terminal().await;

        assert!(snapshot.finished);
        assert_eq!(snapshot.failed_units, 1);
        let counts = handle.counts();
        assert_eq!(counts.created, 2);
        assert_eq!(counts.failed, 1);
        // Every unit ran despite the failure
        assert_eq!(processor.processed.lock().unwrap().len(), 3);
    }

    /// Processor that cancels its own batch on the first call, so later
    /// units observe the flag before doing any work.
    struct CancellingProcessor {
        handle: OnceCell<BatchHandle>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordProcessor for CancellingProcessor {
        async fn process(&self, _record: &SourceRecord) -> Result<UpsertOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = self.handle.get() {
                handle.cancel();
            }
            Ok(UpsertOutcome::Created)
        }
    }

    #[tokio::test]
    async fn cancellation_skips_pending_units_without_rollback() {
        let processor = Arc::new(CancellingProcessor {
            handle: OnceCell::new(),
            calls: AtomicUsize::new(0),
        });
        // Single permit: units run strictly one at a time
        let coordinator = BatchCoordinator::new(processor.clone(), 1);

        let records = vec![record("A"), record("B"), record("C"), record("D")];
        let handle = coordinator.submit(records, 2);
        processor.handle.set(handle.clone()).ok();

        let snapshot = handle.wait_terminal().await;
        assert!(snapshot.cancelled);
        assert!(snapshot.finished);

        let counts = handle.counts();
        // Completed work stays completed; everything after the flag skips
        assert!(counts.created >= 1);
        assert_eq!(counts.created + counts.skipped, 4);
        assert!(counts.skipped >= 1);
        assert_eq!(counts.failed, 0);
    }

    #[tokio::test]
    async fn empty_batch_finishes_immediately() {
        let processor = StubProcessor::new(&[]);
        let coordinator = BatchCoordinator::new(processor, 2);

        let handle = coordinator.submit(Vec::new(), 100);
        let snapshot = handle.wait_terminal().await;
        assert!(snapshot.finished);
        assert_eq!(snapshot.total_units, 0);
        assert_eq!(snapshot.progress_percentage(), 100.0);
    }
}
