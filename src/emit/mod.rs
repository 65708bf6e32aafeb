//! Ordered consensus emission and run-level reporting.

mod writers;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::caller::{CallKind, ConsensusCall};
use crate::genomics::CalledSymbol;
use crate::region::ResolvedRegion;

pub use writers::{
    render_fasta, render_tsv, status_trailer, tsv_row, write_fasta, write_summary_json, write_tsv,
    FASTA_LINE_WIDTH, TSV_HEADER,
};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every position of every region was emitted.
    Complete,
    /// Stopped on request; output ends at `last_position`.
    Cancelled {
        /// Last emitted position, if any.
        last_position: Option<u64>,
    },
    /// The alignment source failed; output ends at `last_position`.
    Failed {
        /// Last emitted position, if any.
        last_position: Option<u64>,
        /// Error reported by the source.
        reason: String,
    },
}

impl RunStatus {
    /// Whether the output covers every requested position.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Cancelled { last_position } => {
                f.write_str("cancelled")?;
                write_last_position(f, *last_position)
            }
            Self::Failed {
                last_position,
                reason,
            } => {
                f.write_str("failed")?;
                write_last_position(f, *last_position)?;
                // Keep the marker on one line.
                let reason: String = reason
                    .chars()
                    .map(|c| if c.is_control() { ' ' } else { c })
                    .collect();
                write!(f, " reason={reason}")
            }
        }
    }
}

fn write_last_position(f: &mut fmt::Formatter<'_>, position: Option<u64>) -> fmt::Result {
    match position {
        Some(position) => write!(f, " last_position={position}"),
        None => f.write_str(" last_position=none"),
    }
}

/// Run-level statistics reported alongside the calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Regions processed, as `ref:start-stop`.
    pub regions: Vec<String>,
    /// Emitted positions.
    pub positions: u64,
    /// Calls with exactly one qualifying symbol.
    pub unambiguous: u64,
    /// Calls with several qualifying symbols.
    pub ambiguous: u64,
    /// Plurality fallbacks.
    pub fallback: u64,
    /// Positions emitted as `N`, for any reason.
    pub no_calls: u64,
    /// Positions forced to `N` by the depth floor.
    pub forced_no_calls: u64,
    /// Mean surviving depth over emitted positions.
    pub mean_depth: f64,
    /// Observations dropped by the depth cap, summed over positions.
    pub total_excess_depth: u64,
    /// blake3 digest of the TSV rows (header excluded).
    pub digest: String,
    /// How the run ended.
    pub status: RunStatus,
}

/// Calls and summary of one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusRun {
    /// Calls in emission order.
    pub calls: Vec<ConsensusCall>,
    /// Run-level statistics.
    pub summary: RunSummary,
}

impl ConsensusRun {
    /// How the run ended.
    pub fn status(&self) -> &RunStatus {
        &self.summary.status
    }

    /// Consensus sequence per reference, in emission order.
    ///
    /// Gap calls contribute nothing and insertion calls contribute their
    /// anchor plus inserted bases.
    pub fn consensus_sequences(&self) -> Vec<(Arc<str>, Vec<u8>)> {
        let mut sequences: Vec<(Arc<str>, Vec<u8>)> = Vec::new();
        for call in &self.calls {
            match sequences.last_mut() {
                Some((reference, sequence)) if *reference == call.reference => {
                    sequence.extend_from_slice(call.called.consensus_bytes());
                }
                _ => sequences.push((
                    Arc::clone(&call.reference),
                    call.called.consensus_bytes().to_vec(),
                )),
            }
        }
        sequences
    }
}

#[derive(Debug, Default)]
struct Counters {
    unambiguous: u64,
    ambiguous: u64,
    fallback: u64,
    no_calls: u64,
    forced_no_calls: u64,
    depth_sum: u64,
    excess_sum: u64,
}

/// Append-only sink for calls in ascending position order.
#[derive(Debug)]
pub struct ConsensusEmitter {
    calls: Vec<ConsensusCall>,
    regions: Vec<String>,
    counters: Counters,
    digest: blake3::Hasher,
}

impl Default for ConsensusEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusEmitter {
    /// Empty emitter.
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            regions: Vec::new(),
            counters: Counters::default(),
            digest: blake3::Hasher::new(),
        }
    }

    /// Record that calls for `region` follow.
    pub fn begin_region(&mut self, region: &ResolvedRegion) {
        self.regions.push(region.to_string());
    }

    /// Append the next call.
    ///
    /// # Panics
    ///
    /// In debug builds, if `call` does not follow the previous call on the
    /// same reference.
    pub fn append(&mut self, call: ConsensusCall) {
        if let Some(previous) = self.calls.last() {
            debug_assert!(
                previous.reference != call.reference || previous.position < call.position,
                "call {}:{} emitted after {}:{}",
                call.reference,
                call.position,
                previous.reference,
                previous.position
            );
        }

        match call.kind {
            CallKind::Unambiguous => self.counters.unambiguous += 1,
            CallKind::Ambiguous => self.counters.ambiguous += 1,
            CallKind::Fallback => self.counters.fallback += 1,
            CallKind::ForcedNoCall => self.counters.forced_no_calls += 1,
        }
        if call.called == CalledSymbol::N {
            self.counters.no_calls += 1;
        }
        self.counters.depth_sum += u64::from(call.surviving_depth);
        self.counters.excess_sum += u64::from(call.excess_depth);
        self.digest.update(tsv_row(&call).as_bytes());
        self.calls.push(call);
    }

    /// Position of the most recent call.
    pub fn last_position(&self) -> Option<u64> {
        self.calls.last().map(|call| call.position)
    }

    /// Close the run with `status`.
    pub fn finish(self, status: RunStatus) -> ConsensusRun {
        let positions = self.calls.len() as u64;
        let mean_depth = if positions == 0 {
            0.0
        } else {
            self.counters.depth_sum as f64 / positions as f64
        };
        let summary = RunSummary {
            regions: self.regions,
            positions,
            unambiguous: self.counters.unambiguous,
            ambiguous: self.counters.ambiguous,
            fallback: self.counters.fallback,
            no_calls: self.counters.no_calls,
            forced_no_calls: self.counters.forced_no_calls,
            mean_depth,
            total_excess_depth: self.counters.excess_sum,
            digest: self.digest.finalize().to_hex().to_string(),
            status,
        };
        ConsensusRun {
            calls: self.calls,
            summary,
        }
    }
}
