//! Batch observability types
//!
//! A `BatchSnapshot` is the read-only view the progress monitor and the
//! final report consume; correctness never depends on snapshot ordering.

use serde::{Deserialize, Serialize};

/// Point-in-time view of one dispatched batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSnapshot {
    /// Correlation id shared by every unit of work in the batch.
    pub batch_id: String,
    pub total_units: usize,
    pub pending_units: usize,
    pub failed_units: usize,
    pub finished: bool,
    pub cancelled: bool,
}

impl BatchSnapshot {
    pub fn empty(batch_id: String) -> Self {
        Self {
            batch_id,
            total_units: 0,
            pending_units: 0,
            failed_units: 0,
            finished: false,
            cancelled: false,
        }
    }

    /// Completion percentage in [0, 100]. An empty batch reports 100.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_units == 0 {
            return 100.0;
        }
        let done = self.total_units - self.pending_units;
        (done as f64 / self.total_units as f64) * 100.0
    }

    /// Terminal once the dispatcher has drained every unit. Cancellation is
    /// not itself terminal: remaining units still resolve (as skips) before
    /// the counters are final.
    pub fn is_terminal(&self) -> bool {
        self.finished
    }
}
