#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use basecaller::genomics::{AlignedRead, CigarOp, CigarOpKind, InMemorySource};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("BASECALLER_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set BASECALLER_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Read on `reference` with an explicit CIGAR and one quality for every base.
pub fn read(
    id: &str,
    reference: &str,
    pos: u64,
    cigar: Vec<CigarOp>,
    sequence: &[u8],
    quality: u8,
) -> AlignedRead {
    AlignedRead::new(
        id,
        reference,
        pos,
        60,
        cigar,
        sequence.to_vec(),
        vec![quality; sequence.len()],
        false,
    )
}

/// Fully matching read.
pub fn matched(id: &str, reference: &str, pos: u64, sequence: &[u8], quality: u8) -> AlignedRead {
    read(
        id,
        reference,
        pos,
        vec![CigarOp::new(CigarOpKind::Match, sequence.len() as u32)],
        sequence,
        quality,
    )
}

/// `copies` identical single-base reads at 0-based `pos`.
pub fn stack(prefix: &str, reference: &str, pos: u64, base: u8, quality: u8, copies: usize) -> Vec<AlignedRead> {
    (0..copies)
        .map(|i| matched(&format!("{prefix}{i}"), reference, pos, &[base], quality))
        .collect()
}

/// Source holding a single reference.
pub fn single_reference(name: &str, length: u64, reads: Vec<AlignedRead>) -> InMemorySource {
    InMemorySource::new(vec![(Arc::from(name), length)], reads)
}

/// Ten-position fixture exercising every call kind.
///
/// With `min_depth = 3` and `min_consensus_fraction = 0.4` the calls are
/// `A C N N AGGG C G Y A N`: unambiguous bases, gap/base ambiguities, a
/// bias-weighted insertion, a pyrimidine code, a three-way plurality
/// fallback and an uncovered forced no-call.
pub fn mixed_fixture() -> InMemorySource {
    let mut reads = Vec::new();
    for i in 0..4 {
        reads.push(matched(&format!("m{i}"), "ref", 0, b"ACGTACGT", 30));
    }
    for i in 0..4 {
        reads.push(read(
            &format!("d{i}"),
            "ref",
            0,
            vec![
                CigarOp::new(CigarOpKind::Match, 2),
                CigarOp::new(CigarOpKind::Deletion, 2),
                CigarOp::new(CigarOpKind::Match, 4),
            ],
            b"ACACGT",
            30,
        ));
    }
    for i in 0..6 {
        reads.push(read(
            &format!("i{i}"),
            "ref",
            4,
            vec![
                CigarOp::new(CigarOpKind::Match, 1),
                CigarOp::new(CigarOpKind::Insertion, 3),
                CigarOp::new(CigarOpKind::Match, 1),
            ],
            b"AGGGC",
            60,
        ));
    }
    reads.extend(stack("y", "ref", 7, b'C', 30, 6));
    reads.extend(stack("a", "ref", 8, b'A', 30, 2));
    reads.extend(stack("c", "ref", 8, b'C', 30, 2));
    reads.extend(stack("g", "ref", 8, b'G', 30, 2));
    single_reference("ref", 10, reads)
}
