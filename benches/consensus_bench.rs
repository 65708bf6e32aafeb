//! Consensus calling throughput over synthetic pileups.

use std::sync::Arc;

use basecaller::caller::call_column;
use basecaller::genomics::{
    AlignedBaseObservation, AlignedRead, CigarOp, CigarOpKind, InMemorySource, PileupColumn,
    Strand, Symbol,
};
use basecaller::{CallerConfig, ConsensusEngine, ExecutionOptions};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const BASES: [u8; 4] = *b"ACGT";

fn synthetic_column(depth: usize) -> PileupColumn {
    let symbols = [Symbol::A, Symbol::A, Symbol::A, Symbol::G, Symbol::Gap];
    PileupColumn {
        reference: Arc::from("bench"),
        position: 1,
        observations: (0..depth)
            .map(|i| AlignedBaseObservation {
                symbol: symbols[i % symbols.len()].clone(),
                quality: (20 + (i * 7) % 45) as u8,
                strand: if i % 2 == 0 { Strand::Forward } else { Strand::Reverse },
                read_id: Arc::from(format!("r{i}").as_str()),
                mapq: 60,
            })
            .collect(),
    }
}

fn synthetic_source(length: u64, read_len: u64, coverage: u64) -> InMemorySource {
    let mut reads = Vec::new();
    let step = (read_len / coverage).max(1);
    let mut pos = 0;
    let mut id = 0usize;
    while pos + read_len <= length {
        let sequence: Vec<u8> = (0..read_len)
            .map(|offset| BASES[((pos + offset) % 4) as usize])
            .collect();
        reads.push(AlignedRead::new(
            format!("read{id}"),
            "bench",
            pos,
            60,
            vec![CigarOp::new(CigarOpKind::Match, read_len as u32)],
            sequence,
            vec![35u8; read_len as usize],
            id % 2 == 1,
        ));
        pos += step;
        id += 1;
    }
    InMemorySource::new(vec![(Arc::from("bench"), length)], reads)
}

fn benchmark_column_calls(c: &mut Criterion) {
    let config = CallerConfig::default();
    let mut group = c.benchmark_group("call_column");
    for depth in [10usize, 100, 1_000] {
        let column = synthetic_column(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &column, |b, column| {
            b.iter(|| black_box(call_column(black_box(column), &config)));
        });
    }
    group.finish();
}

fn benchmark_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_run");
    group.sample_size(20);
    for threads in [1usize, 4] {
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, &threads| {
            b.iter(|| {
                let mut source = synthetic_source(10_000, 150, 30);
                let engine = ConsensusEngine::new(CallerConfig::default())
                    .with_execution(ExecutionOptions::parallel(threads));
                black_box(engine.run(&mut source).map(|run| run.summary.positions))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_column_calls, benchmark_engine);
criterion_main!(benches);
