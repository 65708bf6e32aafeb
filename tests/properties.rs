#[path = "common/mod.rs"]
mod common;
use std::collections::BTreeMap;
use std::sync::Arc;

use basecaller::caller::{call_column, filter_by_quality, regulate_depth, WeightedTally};
use basecaller::genomics::{
    AlignedBaseObservation, AlignedRead, CalledSymbol, PileupColumn, Strand, Symbol,
};
use basecaller::{CallKind, CallerConfig, ConsensusEngine, ExecutionOptions, RegionSpec};
use common::{matched, single_reference};
use proptest::prelude::*;

fn symbol_strategy() -> impl Strategy<Value = Symbol> {
    prop_oneof![
        Just(Symbol::A),
        Just(Symbol::C),
        Just(Symbol::G),
        Just(Symbol::T),
        Just(Symbol::N),
        Just(Symbol::Gap),
    ]
}

fn column_strategy(max_depth: usize) -> impl Strategy<Value = PileupColumn> {
    proptest::collection::vec((symbol_strategy(), 0u8..70), 0..max_depth).prop_map(|bases| {
        PileupColumn {
            reference: Arc::from("ref"),
            position: 1,
            observations: bases
                .into_iter()
                .enumerate()
                .map(|(i, (symbol, quality))| AlignedBaseObservation {
                    symbol,
                    quality,
                    strand: if i % 2 == 0 { Strand::Forward } else { Strand::Reverse },
                    read_id: Arc::from(format!("r{i}").as_str()),
                    mapq: 60,
                })
                .collect(),
        }
    })
}

fn config(min_depth: u32, fraction: f64, bias_threshold: u8, bias: u32) -> CallerConfig {
    CallerConfig::builder()
        .min_depth(min_depth)
        .min_consensus_fraction(fraction)
        .bias_quality_threshold(bias_threshold)
        .bias_factor(bias)
        .build()
        .expect("valid configuration")
}

/// Unweighted majority over quality-passing bases, ties to priority order.
fn unweighted_majority(column: &PileupColumn, min_base_quality: u8, fraction: f64) -> Option<Symbol> {
    let mut counts: BTreeMap<Symbol, u64> = BTreeMap::new();
    for obs in column.observations.iter().filter(|o| o.quality >= min_base_quality) {
        *counts.entry(obs.symbol.clone()).or_default() += 1;
    }
    let total: u64 = counts.values().sum();
    if total == 0 {
        return None;
    }
    if let Some((symbol, _)) = counts
        .iter()
        .find(|(_, count)| **count as f64 / total as f64 >= fraction)
    {
        return Some(symbol.clone());
    }
    let mut best: Option<(&Symbol, u64)> = None;
    for (symbol, count) in &counts {
        if best.map_or(true, |(_, top)| *count > top) {
            best = Some((symbol, *count));
        }
    }
    best.map(|(symbol, _)| symbol.clone())
}

fn reads_strategy(length: u64) -> impl Strategy<Value = Vec<AlignedRead>> {
    let bases = prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')];
    proptest::collection::vec(
        (0..length, proptest::collection::vec(bases, 1..12), 10u8..60),
        0..60,
    )
    .prop_map(move |specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (pos, mut seq, quality))| {
                seq.truncate((length - pos) as usize);
                matched(&format!("r{i}"), "ref", pos, &seq, quality)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn depth_floor_always_forces_n(
        column in column_strategy(40),
        min_depth in 0u32..50,
    ) {
        let cfg = CallerConfig::builder()
            .min_depth(min_depth)
            .build()
            .expect("valid configuration");
        let call = call_column(&column, &cfg);
        if call.surviving_depth < min_depth || call.surviving_depth == 0 {
            prop_assert_eq!(call.called, CalledSymbol::N);
            prop_assert!(call.is_forced_no_call);
            prop_assert_eq!(call.kind, CallKind::ForcedNoCall);
        } else {
            prop_assert!(!call.is_forced_no_call);
        }
        prop_assert!(call.surviving_depth <= call.raw_depth.min(cfg.max_depth()));
    }

    #[test]
    fn depth_cap_bounds_survivors_and_tally_weight(
        column in column_strategy(40),
        max_depth in 1u32..20,
        min_base_quality in 0u8..40,
        bias_threshold in 0u8..70,
        bias in 1u32..20,
    ) {
        let filtered = filter_by_quality(&column, min_base_quality);
        let passing = filtered.passing.len() as u32;
        let regulated = regulate_depth(filtered, max_depth, 1);

        prop_assert!(regulated.surviving_depth <= regulated.raw_depth.min(max_depth));
        prop_assert_eq!(regulated.surviving_depth, passing.min(max_depth));
        prop_assert_eq!(regulated.excess_depth, passing - regulated.surviving_depth);
        prop_assert_eq!(regulated.raw_depth, column.raw_depth());

        let tally = WeightedTally::from_observations(
            regulated.observations.iter().copied(),
            bias_threshold,
            bias,
        );
        prop_assert!(tally.total() <= u64::from(max_depth) * u64::from(bias));

        let cfg = CallerConfig::builder()
            .max_depth(max_depth)
            .min_depth(1)
            .min_base_quality(min_base_quality)
            .bias_quality_threshold(bias_threshold)
            .bias_factor(bias)
            .build()
            .expect("valid configuration");
        let call = call_column(&column, &cfg);
        prop_assert_eq!(call.surviving_depth, regulated.surviving_depth);
        prop_assert_eq!(call.excess_depth, regulated.excess_depth);
        prop_assert!(call.surviving_depth <= call.raw_depth.min(max_depth));
    }

    #[test]
    fn unit_bias_is_an_unweighted_vote(
        column in column_strategy(40),
        fraction in 0.51f64..=1.0,
        bias_threshold in 0u8..70,
    ) {
        let call = call_column(&column, &config(1, fraction, bias_threshold, 1));
        match unweighted_majority(&column, 25, fraction) {
            Some(symbol) => prop_assert_eq!(call.called, CalledSymbol::from_symbol(&symbol)),
            None => prop_assert!(call.is_forced_no_call),
        }
    }

    #[test]
    fn raising_a_majority_threshold_only_weakens_calls(
        column in column_strategy(40),
        low in 0.51f64..=1.0,
        delta in 0.0f64..0.5,
        bias in 1u32..20,
    ) {
        let high = (low + delta).min(1.0);
        let loose = call_column(&column, &config(1, low, 50, bias));
        let strict = call_column(&column, &config(1, high, 50, bias));
        if strict.kind == CallKind::Unambiguous {
            prop_assert_eq!(loose.kind, CallKind::Unambiguous);
            prop_assert_eq!(loose.called, strict.called);
        }
        prop_assert!(strict.kind != CallKind::Ambiguous);
    }

    #[test]
    fn raising_a_low_threshold_never_rescues_a_fallback(
        column in column_strategy(40),
        low in 0.05f64..=0.5,
        delta in 0.0f64..0.5,
    ) {
        let high = low + delta;
        let loose = call_column(&column, &config(1, low, 50, 10));
        let strict = call_column(&column, &config(1, high, 50, 10));
        if loose.kind == CallKind::Fallback {
            prop_assert_eq!(strict.kind, CallKind::Fallback);
        }
        if loose.kind == CallKind::Unambiguous {
            prop_assert!(strict.kind != CallKind::Ambiguous);
        }
    }

    #[test]
    fn output_covers_the_region_exactly(
        length in 1u64..80,
        start_seed in 0u64..80,
        span in 0u64..80,
        reads in reads_strategy(80),
    ) {
        let reads: Vec<AlignedRead> = reads.into_iter().filter(|read| read.pos < length).collect();
        let reads = reads
            .into_iter()
            .map(|read| {
                let keep = (length - read.pos).min(read.len() as u64) as usize;
                matched(&read.read_id, "ref", read.pos, &read.sequence[..keep], read.qualities[0])
            })
            .collect();
        let start = start_seed % length + 1;
        let stop = start + span;
        let region: RegionSpec = format!("ref:{start}-{stop}").parse().expect("region parses");
        let cfg = CallerConfig::builder()
            .region(Some(region))
            .min_depth(2)
            .build()
            .expect("valid configuration");

        let run = ConsensusEngine::new(cfg)
            .run(&mut single_reference("ref", length, reads))
            .expect("run succeeds");
        let positions: Vec<u64> = run.calls.iter().map(|call| call.position).collect();
        let expected: Vec<u64> = (start..=stop.min(length)).collect();
        prop_assert_eq!(positions, expected);
    }

    #[test]
    fn serial_and_parallel_runs_agree(
        reads in reads_strategy(60),
        threads in 2usize..6,
        batch_size in 1usize..20,
    ) {
        let cfg = || config(2, 0.6, 40, 5);
        let serial = ConsensusEngine::new(cfg())
            .run(&mut single_reference("ref", 60, reads.clone()))
            .expect("serial run succeeds");
        let parallel = ConsensusEngine::new(cfg())
            .with_execution(ExecutionOptions::parallel(threads).with_batch_size(batch_size))
            .run(&mut single_reference("ref", 60, reads))
            .expect("parallel run succeeds");
        prop_assert_eq!(serial.calls, parallel.calls);
        prop_assert_eq!(serial.summary.digest, parallel.summary.digest);
    }
}
