#[path = "common/mod.rs"]
mod common;
use std::collections::HashSet;

use blake3::hash;
use basecaller::emit::render_tsv;
use basecaller::{CallerConfig, ConsensusEngine, ExecutionOptions};
use common::mixed_fixture;

fn config() -> CallerConfig {
    CallerConfig::builder()
        .min_depth(3)
        .min_consensus_fraction(0.4)
        .build()
        .expect("valid configuration")
}

#[test]
fn repeated_runs_are_byte_identical() {
    let mut fingerprints = HashSet::new();
    let mut digests = HashSet::new();
    for _ in 0..5 {
        let run = ConsensusEngine::new(config())
            .run(&mut mixed_fixture())
            .expect("run succeeds");
        let tsv = render_tsv(&run).expect("rendering succeeds");
        fingerprints.insert(hash(tsv.as_bytes()));
        digests.insert(run.summary.digest.clone());
    }

    assert_eq!(fingerprints.len(), 1, "outputs diverged across runs");
    assert_eq!(digests.len(), 1, "summary digests diverged across runs");
}

#[test]
fn thread_count_never_changes_output() {
    let mut fingerprints = HashSet::new();
    for threads in [1, 2, 4, 8] {
        for batch_size in [1, 3, 64] {
            let run = ConsensusEngine::new(config())
                .with_execution(ExecutionOptions::parallel(threads).with_batch_size(batch_size))
                .run(&mut mixed_fixture())
                .expect("run succeeds");
            let tsv = render_tsv(&run).expect("rendering succeeds");
            fingerprints.insert(hash(tsv.as_bytes()));
        }
    }

    assert_eq!(fingerprints.len(), 1, "scheduling changed the output");
}
