//! # Consensus base calling over aligned-read pileups
//!
//! Turns the reads overlapping a reference region into one called symbol per
//! reference position: a base, an IUPAC ambiguity code, a gap, an insertion,
//! or `N`.
//!
//! ## Pipeline
//!
//! 1. **Region/config resolution**: [`region`] and [`config`] validate the
//!    requested interval and tunables before any read is touched.
//! 2. **Pileup**: [`genomics::PileupBuilder`] turns a coordinate-sorted read
//!    stream into one [`genomics::PileupColumn`] per position, gapless.
//! 3. **Calling**: [`caller`] filters by base quality, regulates depth and
//!    tallies bias-weighted evidence into a [`caller::CallDecision`].
//! 4. **Emission**: [`emit::ConsensusEmitter`] appends calls in ascending
//!    order and accumulates run statistics.
//!
//! Columns are independent, so [`framework::OrderedEvaluator`] may process
//! them on a worker pool; output order never depends on scheduling.
//!
//! ## Usage Example
//!
//! ```ignore
//! use basecaller::{CallerConfig, ConsensusEngine};
//! use basecaller::genomics::BamAlignmentSource;
//!
//! let config = CallerConfig::builder().min_depth(5).build()?;
//! let mut source = BamAlignmentSource::open("sample.bam")?;
//! let run = ConsensusEngine::new(config).run(&mut source)?;
//! println!("{} positions, {} no-calls", run.summary.positions, run.summary.no_calls);
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod caller; // Quality filter, depth regulator, weighted tally
pub mod config; // Caller tunables and config files
pub mod emit; // Ordered emission and output writers
pub mod framework; // Ordered (optionally parallel) column evaluation
pub mod genomics; // Reads, symbols, pileups, alignment sources
pub mod region; // Region strings and reference coordinates

pub use caller::{CallDecision, CallKind, ConsensusCall};
pub use config::{CallerConfig, CallerConfigBuilder, ConfigError, ExecutionOptions};
pub use emit::{ConsensusEmitter, ConsensusRun, RunStatus, RunSummary};
pub use framework::CancellationToken;
pub use region::{RegionError, RegionSpec, ResolvedRegion};

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use caller::ColumnCaller;
use framework::{ColumnProcessor, OrderedEvaluator};
use genomics::{
    AlignmentSource, ColumnStatistics, PileupBuilder, PositionStatistics, SourceError,
    StatisticsSettings,
};

/// Errors surfaced by a consensus run.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The configuration was rejected before any work started.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// The region could not be resolved; nothing was emitted.
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] RegionError),

    /// The alignment source failed mid-run.
    ///
    /// `partial` holds every call emitted before the failure and is flagged
    /// [`RunStatus::Failed`].
    #[error("alignment stream failed: {source}")]
    Stream {
        /// Failure reported by the source.
        source: SourceError,
        /// Calls emitted before the failure.
        partial: Box<ConsensusRun>,
    },

    /// Position statistics could not be gathered.
    #[error("statistics collection failed: {0}")]
    Statistics(#[source] SourceError),

    /// The worker pool could not be started.
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl ConsensusError {
    /// Calls emitted before a stream failure, if this is one.
    pub fn partial_run(&self) -> Option<&ConsensusRun> {
        match self {
            Self::Stream { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Runs the consensus pipeline over an [`AlignmentSource`].
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    config: Arc<CallerConfig>,
    options: ExecutionOptions,
    cancel: CancellationToken,
}

impl ConsensusEngine {
    /// Serial engine using `config`.
    pub fn new(config: CallerConfig) -> Self {
        Self {
            config: Arc::new(config),
            options: ExecutionOptions::serial(),
            cancel: CancellationToken::new(),
        }
    }

    /// Validate `builder` and wrap the result in an engine.
    pub fn from_builder(builder: CallerConfigBuilder) -> Result<Self, ConsensusError> {
        Ok(Self::new(builder.build()?))
    }

    /// Use `options` for scheduling.
    pub fn with_execution(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    /// Token that stops a running (or future) [`ConsensusEngine::run`] at the
    /// next column boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Call every position of the configured region, or of every reference
    /// when no region is set.
    ///
    /// Regions are resolved before any read is fetched, so region errors
    /// never come with partial output.
    pub fn run<S: AlignmentSource>(&self, source: &mut S) -> Result<ConsensusRun, ConsensusError> {
        let regions = region::resolve_regions(self.config.region(), &*source)?;
        let evaluator = self.evaluator()?;

        info!(
            regions = regions.len(),
            minbq = self.config.min_base_quality(),
            maxd = self.config.max_depth(),
            mind = self.config.min_depth(),
            minth = self.config.min_consensus_fraction(),
            biasth = self.config.bias_quality_threshold(),
            bias = self.config.bias_factor(),
            minmq = self.config.min_mapping_quality(),
            threads = self.options.threads,
            "starting consensus run"
        );

        let caller = ColumnCaller::new(Arc::clone(&self.config));
        let builder = PileupBuilder::new(self.config.min_mapping_quality());
        let mut emitter = ConsensusEmitter::new();

        for region in regions {
            debug!(region = %region, "calling region");
            emitter.begin_region(&region);

            let reads = match source.fetch(&region) {
                Ok(reads) => reads,
                Err(err) => return Err(stream_failure(emitter, err)),
            };
            let columns = builder.columns(reads, region.clone());

            match evaluator.evaluate(columns, &caller, |call| emitter.append(call)) {
                Ok(outcome) if outcome.cancelled => {
                    let last_position = emitter.last_position();
                    warn!(region = %region, ?last_position, "consensus run cancelled");
                    return Ok(emitter.finish(RunStatus::Cancelled { last_position }));
                }
                Ok(outcome) => debug!(region = %region, emitted = outcome.emitted, "region complete"),
                Err(err) => return Err(stream_failure(emitter, err)),
            }
        }

        let run = emitter.finish(RunStatus::Complete);
        info!(
            positions = run.summary.positions,
            ambiguous = run.summary.ambiguous,
            no_calls = run.summary.no_calls,
            mean_depth = run.summary.mean_depth,
            "consensus run complete"
        );
        Ok(run)
    }

    fn evaluator(&self) -> Result<OrderedEvaluator, ConsensusError> {
        OrderedEvaluator::new(self.options, self.cancel.clone())
            .map_err(|err| ConsensusError::WorkerPool(err.to_string()))
    }
}

fn stream_failure(emitter: ConsensusEmitter, source: SourceError) -> ConsensusError {
    let last_position = emitter.last_position();
    warn!(error = %source, ?last_position, "alignment source failed; output is partial");
    let partial = emitter.finish(RunStatus::Failed {
        last_position,
        reason: source.to_string(),
    });
    ConsensusError::Stream {
        source,
        partial: Box::new(partial),
    }
}

/// Per-position statistics for `region` (see [`genomics::column_statistics`]).
///
/// Columns are produced lazily, one per position, so a whole reference can be
/// reported without holding every column in memory.
pub fn position_statistics<'s, S: AlignmentSource>(
    source: &'s mut S,
    region: &RegionSpec,
    settings: StatisticsSettings,
) -> Result<impl Iterator<Item = Result<ColumnStatistics, ConsensusError>> + 's, ConsensusError> {
    let region = region.resolve(&*source)?;
    let processor = PositionStatistics::new(settings);
    let builder = PileupBuilder::new(settings.min_mapping_quality);

    debug!(region = %region, "gathering position statistics");
    let reads = source.fetch(&region).map_err(ConsensusError::Statistics)?;
    Ok(builder.columns(reads, region).map(move |column| {
        column
            .map(|column| processor.process(&column))
            .map_err(ConsensusError::Statistics)
    }))
}
