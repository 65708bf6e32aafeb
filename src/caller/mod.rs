//! Per-column consensus calling.
//!
//! A column flows through [`filter_by_quality`], [`regulate_depth`] and, when
//! it is callable, a [`WeightedTally`]. The outcome is a [`CallDecision`],
//! which fixes the emitted symbol.

mod depth;
mod filter;
mod tally;

pub use depth::{regulate_depth, RegulatedColumn};
pub use filter::{filter_by_quality, QualityFiltered};
pub use tally::{TallyOutcome, WeightedTally};

use std::fmt;
use std::sync::Arc;

use crate::config::CallerConfig;
use crate::framework::ColumnProcessor;
use crate::genomics::{CalledSymbol, PileupColumn, Symbol};

/// How a column's call was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallDecision {
    /// One symbol met the consensus threshold.
    Unambiguous(Symbol),
    /// Several symbols met the threshold (priority order).
    Ambiguous(Vec<Symbol>),
    /// Nothing met the threshold; the plurality symbol was called.
    Fallback(Symbol),
    /// Too little surviving depth to call anything.
    ForcedNoCall,
}

impl CallDecision {
    /// Symbol written to the consensus.
    pub fn called_symbol(&self) -> CalledSymbol {
        match self {
            Self::Unambiguous(symbol) | Self::Fallback(symbol) => CalledSymbol::from_symbol(symbol),
            Self::Ambiguous(symbols) => CalledSymbol::from_symbol_set(symbols),
            Self::ForcedNoCall => CalledSymbol::N,
        }
    }

    /// Decision tier without its payload.
    pub fn kind(&self) -> CallKind {
        match self {
            Self::Unambiguous(_) => CallKind::Unambiguous,
            Self::Ambiguous(_) => CallKind::Ambiguous,
            Self::Fallback(_) => CallKind::Fallback,
            Self::ForcedNoCall => CallKind::ForcedNoCall,
        }
    }
}

/// Decision tier of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// See [`CallDecision::Unambiguous`].
    Unambiguous,
    /// See [`CallDecision::Ambiguous`].
    Ambiguous,
    /// See [`CallDecision::Fallback`].
    Fallback,
    /// See [`CallDecision::ForcedNoCall`].
    ForcedNoCall,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unambiguous => "unambiguous",
            Self::Ambiguous => "ambiguous",
            Self::Fallback => "fallback",
            Self::ForcedNoCall => "no_call",
        };
        f.write_str(label)
    }
}

/// Consensus emitted for one reference position.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusCall {
    /// Reference name.
    pub reference: Arc<str>,
    /// 1-based reference position.
    pub position: u64,
    /// Emitted symbol.
    pub called: CalledSymbol,
    /// Decision tier.
    pub kind: CallKind,
    /// Quality-passing observations kept after the depth cap.
    pub surviving_depth: u32,
    /// Observations before filtering.
    pub raw_depth: u32,
    /// Quality-passing observations dropped by the depth cap.
    pub excess_depth: u32,
    /// Share of the tally weight held by the called symbol(s).
    pub confidence: f64,
    /// Whether the depth floor forced this call to `N`.
    pub is_forced_no_call: bool,
}

impl ConsensusCall {
    /// Whether the call is an ambiguity code or an ambiguous `N`.
    pub fn is_ambiguous(&self) -> bool {
        self.kind == CallKind::Ambiguous
    }
}

/// Run one column through filter, depth regulation and tally.
pub fn call_column(column: &PileupColumn, config: &CallerConfig) -> ConsensusCall {
    let filtered = filter_by_quality(column, config.min_base_quality());
    let regulated = regulate_depth(filtered, config.max_depth(), config.min_depth());

    let (decision, confidence) = if regulated.forced_no_call {
        (CallDecision::ForcedNoCall, 0.0)
    } else {
        let tally = WeightedTally::from_observations(
            regulated.observations.iter().copied(),
            config.bias_quality_threshold(),
            config.bias_factor(),
        );
        decide(&tally, config.min_consensus_fraction())
    };

    ConsensusCall {
        reference: Arc::clone(&column.reference),
        position: column.position,
        called: decision.called_symbol(),
        kind: decision.kind(),
        surviving_depth: regulated.surviving_depth,
        raw_depth: regulated.raw_depth,
        excess_depth: regulated.excess_depth,
        confidence,
        is_forced_no_call: regulated.forced_no_call,
    }
}

/// Map a tally onto a decision and the weight share backing it.
pub fn decide(tally: &WeightedTally, min_fraction: f64) -> (CallDecision, f64) {
    match tally.decide(min_fraction) {
        TallyOutcome::Empty => (CallDecision::ForcedNoCall, 0.0),
        TallyOutcome::Single(symbol) => {
            let share = tally.fraction(&symbol);
            (CallDecision::Unambiguous(symbol), share)
        }
        TallyOutcome::Several(symbols) => {
            let share = symbols.iter().map(|s| tally.fraction(s)).sum();
            (CallDecision::Ambiguous(symbols), share)
        }
        TallyOutcome::Plurality(symbol) => {
            let share = tally.fraction(&symbol);
            (CallDecision::Fallback(symbol), share)
        }
    }
}

/// [`ColumnProcessor`] producing a [`ConsensusCall`] per column.
#[derive(Debug, Clone)]
pub struct ColumnCaller {
    config: Arc<CallerConfig>,
}

impl ColumnCaller {
    /// Caller sharing `config` read-only.
    pub fn new(config: Arc<CallerConfig>) -> Self {
        Self { config }
    }
}

impl ColumnProcessor for ColumnCaller {
    type Output = ConsensusCall;

    fn process(&self, column: &PileupColumn) -> ConsensusCall {
        call_column(column, &self.config)
    }
}
