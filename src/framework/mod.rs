//! Ordered column evaluation.
//!
//! Columns are independent, so they may be processed on a worker pool, but
//! results always leave the evaluator in ascending position order. The
//! pieces here know nothing about consensus calling: anything implementing
//! [`ColumnProcessor`] can be driven over a pileup stream.

mod ordered_eval;
mod reorder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::genomics::PileupColumn;

pub use ordered_eval::{EvaluationOutcome, FrameworkError, OrderedEvaluator};
pub use reorder::ReorderBuffer;

/// Per-column work driven by an [`OrderedEvaluator`].
///
/// Implementations are shared read-only across worker threads.
pub trait ColumnProcessor: Sync {
    /// Result produced for each column.
    type Output: Send;

    /// Process one column without reference to its neighbours.
    fn process(&self, column: &PileupColumn) -> Self::Output;
}

/// Cooperative cancellation flag, checked at column boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
