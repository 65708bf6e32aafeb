use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::framework::ColumnProcessor;
use crate::genomics::{PileupColumn, Symbol};

/// Thresholds applied before statistics are gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatisticsSettings {
    /// Reads below this mapping quality are ignored (applied by the pileup builder).
    pub min_mapping_quality: u8,
    /// Bases below this quality are ignored.
    pub min_base_quality: u8,
    /// At most this many passing bases are counted, in arrival order.
    pub max_depth: u32,
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            min_mapping_quality: 25,
            min_base_quality: 25,
            max_depth: 100_000,
        }
    }
}

/// Evidence for one symbol at one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolStatistics {
    /// Observed symbol, rendered as text (`-` for a gap).
    pub symbol: String,
    /// Counted observations.
    pub depth: u32,
    /// Mean mapping quality, two decimals.
    pub avg_mapping_quality: f64,
    /// Mean base quality, two decimals.
    pub avg_base_quality: f64,
    /// Share of the column depth, in percent with two decimals.
    pub pct_total: f64,
}

/// Summary of one pileup column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    /// Reference name.
    pub reference: Arc<str>,
    /// 1-based position.
    pub position: u64,
    /// Counted observations across all symbols.
    pub total_depth: u32,
    /// Mean mapping quality over the counted observations.
    pub avg_mapping_quality: f64,
    /// Mean base quality over the counted observations.
    pub avg_base_quality: f64,
    /// Per-symbol breakdown, most supported first.
    pub symbols: Vec<SymbolStatistics>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Default)]
struct Accumulator {
    depth: u32,
    mapq_sum: u64,
    baseq_sum: u64,
}

impl Accumulator {
    fn add(&mut self, mapq: u8, baseq: u8) {
        self.depth += 1;
        self.mapq_sum += u64::from(mapq);
        self.baseq_sum += u64::from(baseq);
    }

    fn mean_mapq(&self) -> f64 {
        round2(self.mapq_sum as f64 / self.depth as f64)
    }

    fn mean_baseq(&self) -> f64 {
        round2(self.baseq_sum as f64 / self.depth as f64)
    }
}

/// Gather statistics for `column` under `settings`.
pub fn column_statistics(column: &PileupColumn, settings: &StatisticsSettings) -> ColumnStatistics {
    let mut overall = Accumulator::default();
    let mut per_symbol: Vec<(Symbol, Accumulator)> = Vec::new();

    let counted = column
        .observations
        .iter()
        .filter(|obs| obs.quality >= settings.min_base_quality)
        .take(settings.max_depth as usize);
    for obs in counted {
        overall.add(obs.mapq, obs.quality);
        match per_symbol.iter_mut().find(|(symbol, _)| *symbol == obs.symbol) {
            Some((_, acc)) => acc.add(obs.mapq, obs.quality),
            None => {
                let mut acc = Accumulator::default();
                acc.add(obs.mapq, obs.quality);
                per_symbol.push((obs.symbol.clone(), acc));
            }
        }
    }

    if overall.depth == 0 {
        return ColumnStatistics {
            reference: Arc::clone(&column.reference),
            position: column.position,
            total_depth: 0,
            avg_mapping_quality: 0.0,
            avg_base_quality: 0.0,
            symbols: Vec::new(),
        };
    }

    per_symbol.sort_by(|(left_symbol, left), (right_symbol, right)| {
        let left_pct = round2(f64::from(left.depth) / f64::from(overall.depth) * 100.0);
        let right_pct = round2(f64::from(right.depth) / f64::from(overall.depth) * 100.0);
        right_pct
            .total_cmp(&left_pct)
            .then_with(|| right.mean_baseq().total_cmp(&left.mean_baseq()))
            .then_with(|| left_symbol.cmp(right_symbol))
    });

    let symbols = per_symbol
        .iter()
        .map(|(symbol, acc)| SymbolStatistics {
            symbol: symbol.to_string(),
            depth: acc.depth,
            avg_mapping_quality: acc.mean_mapq(),
            avg_base_quality: acc.mean_baseq(),
            pct_total: round2(f64::from(acc.depth) / f64::from(overall.depth) * 100.0),
        })
        .collect();

    ColumnStatistics {
        reference: Arc::clone(&column.reference),
        position: column.position,
        total_depth: overall.depth,
        avg_mapping_quality: overall.mean_mapq(),
        avg_base_quality: overall.mean_baseq(),
        symbols,
    }
}

/// [`ColumnProcessor`] producing [`ColumnStatistics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionStatistics {
    settings: StatisticsSettings,
}

impl PositionStatistics {
    /// Processor applying `settings`.
    pub fn new(settings: StatisticsSettings) -> Self {
        Self { settings }
    }
}

impl ColumnProcessor for PositionStatistics {
    type Output = ColumnStatistics;

    fn process(&self, column: &PileupColumn) -> ColumnStatistics {
        column_statistics(column, &self.settings)
    }
}

/// Write the human-readable report for one position.
pub fn write_statistics<W: fmt::Write>(
    out: &mut W,
    settings: &StatisticsSettings,
    stats: &ColumnStatistics,
) -> fmt::Result {
    writeln!(out, "Position: {}:{}", stats.reference, stats.position)?;
    writeln!(out, "Maximum Depth: {}", settings.max_depth)?;
    writeln!(out, "Minimum Mapping Quality Threshold: {}", settings.min_mapping_quality)?;
    writeln!(out, "Minimum Base Quality Threshold: {}", settings.min_base_quality)?;
    writeln!(out, "Average Mapping Quality: {}", stats.avg_mapping_quality)?;
    writeln!(out, "Average Base Quality: {}", stats.avg_base_quality)?;
    writeln!(out, "Depth: {}", stats.total_depth)?;
    for symbol in &stats.symbols {
        writeln!(out, "Base: {}", symbol.symbol)?;
        writeln!(out, "\tDepth: {}", symbol.depth)?;
        writeln!(out, "\tAverage Mapping Quality: {}", symbol.avg_mapping_quality)?;
        writeln!(out, "\tAverage Base Quality: {}", symbol.avg_base_quality)?;
        writeln!(out, "\t% of Total: {}", symbol.pct_total)?;
    }
    Ok(())
}
