use crossbeam_channel::bounded;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;
use tracing::debug;

use super::{CancellationToken, ColumnProcessor, ReorderBuffer};
use crate::config::ExecutionOptions;
use crate::genomics::{PileupColumn, SourceError};

/// Chunks handed to the pool per worker thread and batch.
const CHUNKS_PER_THREAD: usize = 4;

/// Errors raised while setting up the evaluator.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// Execution options cannot drive an evaluation.
    #[error("invalid evaluator configuration: {0}")]
    InvalidConfiguration(String),

    /// The rayon pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// What an evaluation pass emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationOutcome {
    /// Outputs handed to the sink, in column order.
    pub emitted: u64,
    /// Whether the pass stopped on the cancellation token.
    pub cancelled: bool,
}

/// Drives a [`ColumnProcessor`] over a column stream and hands outputs to a
/// sink in stream order.
///
/// Serially, each column is processed as it is pulled. With more than one
/// thread the stream is materialised in batches, chunks of each batch are
/// processed on a rayon pool, and finished chunks are re-serialised through a
/// [`ReorderBuffer`] before reaching the sink.
#[derive(Debug)]
pub struct OrderedEvaluator {
    options: ExecutionOptions,
    pool: Option<ThreadPool>,
    cancel: CancellationToken,
}

impl OrderedEvaluator {
    /// Build an evaluator, starting a worker pool if `options` ask for one.
    pub fn new(options: ExecutionOptions, cancel: CancellationToken) -> Result<Self, FrameworkError> {
        if options.batch_size == 0 {
            return Err(FrameworkError::InvalidConfiguration(
                "batch size must be > 0".to_string(),
            ));
        }
        let pool = if options.is_parallel() {
            let pool = ThreadPoolBuilder::new()
                .num_threads(options.threads)
                .thread_name(|index| format!("basecaller-worker-{index}"))
                .build()?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            options,
            pool,
            cancel,
        })
    }

    /// Process every column and feed the outputs to `sink` in stream order.
    ///
    /// Cancellation is observed between columns. On a stream error, every
    /// column read before the failure is still processed and emitted, then
    /// the error is returned.
    pub fn evaluate<I, P, F>(
        &self,
        columns: I,
        processor: &P,
        mut sink: F,
    ) -> Result<EvaluationOutcome, SourceError>
    where
        I: IntoIterator<Item = Result<PileupColumn, SourceError>>,
        P: ColumnProcessor,
        F: FnMut(P::Output),
    {
        match &self.pool {
            Some(pool) => self.evaluate_parallel(pool, columns.into_iter(), processor, &mut sink),
            None => self.evaluate_serial(columns.into_iter(), processor, &mut sink),
        }
    }

    fn evaluate_serial<I, P, F>(
        &self,
        columns: I,
        processor: &P,
        sink: &mut F,
    ) -> Result<EvaluationOutcome, SourceError>
    where
        I: Iterator<Item = Result<PileupColumn, SourceError>>,
        P: ColumnProcessor,
        F: FnMut(P::Output),
    {
        let mut outcome = EvaluationOutcome::default();
        for column in columns {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            let column = column?;
            sink(processor.process(&column));
            outcome.emitted += 1;
        }
        Ok(outcome)
    }

    fn evaluate_parallel<I, P, F>(
        &self,
        pool: &ThreadPool,
        mut columns: I,
        processor: &P,
        sink: &mut F,
    ) -> Result<EvaluationOutcome, SourceError>
    where
        I: Iterator<Item = Result<PileupColumn, SourceError>>,
        P: ColumnProcessor,
        F: FnMut(P::Output),
    {
        let batch_size = self.options.batch_size;
        let mut outcome = EvaluationOutcome::default();

        loop {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return Ok(outcome);
            }

            let mut batch = Vec::with_capacity(batch_size);
            let mut failure = None;
            for column in columns.by_ref() {
                match column {
                    Ok(column) => {
                        batch.push(column);
                        if batch.len() == batch_size {
                            break;
                        }
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }

            if !batch.is_empty() {
                debug!(columns = batch.len(), "evaluating batch");
                let emitted = self.process_batch(pool, &batch, processor, sink);
                outcome.emitted += emitted as u64;
                if emitted < batch.len() {
                    outcome.cancelled = true;
                    return Ok(outcome);
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
            if batch.len() < batch_size {
                return Ok(outcome);
            }
        }
    }

    /// Returns how many outputs reached the sink; fewer than `batch.len()`
    /// only when cancelled.
    fn process_batch<P, F>(
        &self,
        pool: &ThreadPool,
        batch: &[PileupColumn],
        processor: &P,
        sink: &mut F,
    ) -> usize
    where
        P: ColumnProcessor,
        F: FnMut(P::Output),
    {
        let chunk_size = batch
            .len()
            .div_ceil(self.options.threads * CHUNKS_PER_THREAD)
            .max(1);
        let chunk_count = batch.len().div_ceil(chunk_size);
        let (tx, rx) = bounded::<(u64, Vec<P::Output>)>(chunk_count);
        let cancel = &self.cancel;

        pool.in_place_scope(|scope| {
            for (seq, chunk) in batch.chunks(chunk_size).enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let outputs = chunk.iter().map(|column| processor.process(column)).collect();
                    // Receiver outlives the scope.
                    let _ = tx.send((seq as u64, outputs));
                });
            }
            drop(tx);

            let mut reorder = ReorderBuffer::new();
            let mut emitted = 0;
            let mut stopped = false;
            for (seq, outputs) in rx.iter() {
                if stopped {
                    continue;
                }
                reorder.insert(seq, outputs);
                while let Some(ready) = reorder.try_pop_next() {
                    for output in ready {
                        if cancel.is_cancelled() {
                            stopped = true;
                            break;
                        }
                        sink(output);
                        emitted += 1;
                    }
                    if stopped {
                        break;
                    }
                }
            }
            emitted
        })
    }
}
