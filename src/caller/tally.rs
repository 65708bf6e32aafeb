use std::collections::BTreeMap;

use crate::genomics::{AlignedBaseObservation, Symbol};

/// Bias-weighted symbol counts for one column.
///
/// Bases at or above the bias quality threshold weigh `bias_factor`, all
/// others weigh one. Iteration follows the symbol priority order, which is
/// what makes tie-breaking deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightedTally {
    weights: BTreeMap<Symbol, u64>,
    total: u64,
}

/// Result of comparing tally fractions against the consensus threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyOutcome {
    /// Nothing was tallied.
    Empty,
    /// Exactly one symbol met the threshold.
    Single(Symbol),
    /// Several symbols met the threshold, in priority order.
    Several(Vec<Symbol>),
    /// No symbol met the threshold; the highest-weight symbol wins.
    Plurality(Symbol),
}

impl WeightedTally {
    /// Empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally observations with the given bias settings.
    pub fn from_observations<'a>(
        observations: impl IntoIterator<Item = &'a AlignedBaseObservation>,
        bias_quality_threshold: u8,
        bias_factor: u32,
    ) -> Self {
        let mut tally = Self::new();
        for obs in observations {
            let weight = if obs.quality >= bias_quality_threshold {
                u64::from(bias_factor)
            } else {
                1
            };
            tally.add(&obs.symbol, weight);
        }
        tally
    }

    /// Add `weight` in favour of `symbol`.
    pub fn add(&mut self, symbol: &Symbol, weight: u64) {
        match self.weights.get_mut(symbol) {
            Some(existing) => *existing += weight,
            None => {
                self.weights.insert(symbol.clone(), weight);
            }
        }
        self.total += weight;
    }

    /// Sum of all weights.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Weight accumulated by `symbol`.
    pub fn weight(&self, symbol: &Symbol) -> u64 {
        self.weights.get(symbol).copied().unwrap_or(0)
    }

    /// Fraction of the total weight held by `symbol`.
    pub fn fraction(&self, symbol: &Symbol) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.weight(symbol) as f64 / self.total as f64
    }

    /// Symbols and weights in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, u64)> {
        self.weights.iter().map(|(symbol, weight)| (symbol, *weight))
    }

    /// Highest-weight symbol; ties go to the higher-priority symbol.
    pub fn plurality(&self) -> Option<&Symbol> {
        let mut best: Option<(&Symbol, u64)> = None;
        for (symbol, weight) in self.iter() {
            if best.map_or(true, |(_, top)| weight > top) {
                best = Some((symbol, weight));
            }
        }
        best.map(|(symbol, _)| symbol)
    }

    /// Classify the tally against `min_fraction`.
    pub fn decide(&self, min_fraction: f64) -> TallyOutcome {
        if self.total == 0 {
            return TallyOutcome::Empty;
        }
        let mut qualifying: Vec<Symbol> = self
            .iter()
            .filter(|(_, weight)| *weight as f64 / self.total as f64 >= min_fraction)
            .map(|(symbol, _)| symbol.clone())
            .collect();

        if qualifying.len() > 1 {
            return TallyOutcome::Several(qualifying);
        }
        match qualifying.pop() {
            Some(symbol) => TallyOutcome::Single(symbol),
            None => match self.plurality() {
                Some(symbol) => TallyOutcome::Plurality(symbol.clone()),
                None => TallyOutcome::Empty,
            },
        }
    }
}
