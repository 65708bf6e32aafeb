use std::path::Path;
use std::sync::Arc;

use rust_htslib::bam::{self, record::Cigar, Read};

use crate::genomics::{AlignedRead, AlignmentSource, CigarOp, CigarOpKind, ReadStream, SourceError};
use crate::region::{ReferenceCatalog, ResolvedRegion};

/// Quality value BAM uses when base qualities are absent.
const MISSING_QUALITY: u8 = 0xff;

/// Coordinate-sorted, indexed BAM file used as an alignment source.
///
/// Unmapped, secondary, QC-failed and duplicate records are skipped, matching
/// the samtools pileup defaults.
pub struct BamAlignmentSource {
    reader: bam::IndexedReader,
    references: Vec<(Arc<str>, u64)>,
}

impl std::fmt::Debug for BamAlignmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BamAlignmentSource")
            .field("references", &self.references)
            .finish()
    }
}

impl BamAlignmentSource {
    /// Open an indexed BAM file (the `.bai`/`.csi` index must exist).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let reader = bam::IndexedReader::from_path(path.as_ref())?;
        let header = reader.header();
        let references = header
            .target_names()
            .into_iter()
            .enumerate()
            .map(|(tid, name)| {
                let length = header.target_len(tid as u32).unwrap_or(0);
                (Arc::from(String::from_utf8_lossy(name).as_ref()), length)
            })
            .collect();
        Ok(Self { reader, references })
    }
}

impl ReferenceCatalog for BamAlignmentSource {
    fn references(&self) -> Vec<(Arc<str>, u64)> {
        self.references.clone()
    }
}

fn convert_cigar(cigar: &Cigar) -> CigarOp {
    match *cigar {
        Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
            CigarOp::new(CigarOpKind::Match, len)
        }
        Cigar::Ins(len) => CigarOp::new(CigarOpKind::Insertion, len),
        Cigar::Del(len) => CigarOp::new(CigarOpKind::Deletion, len),
        Cigar::RefSkip(len) => CigarOp::new(CigarOpKind::RefSkip, len),
        Cigar::SoftClip(len) => CigarOp::new(CigarOpKind::SoftClip, len),
        Cigar::HardClip(len) => CigarOp::new(CigarOpKind::HardClip, len),
        Cigar::Pad(len) => CigarOp::new(CigarOpKind::Pad, len),
    }
}

fn is_usable(record: &bam::Record) -> bool {
    !(record.is_unmapped()
        || record.is_secondary()
        || record.is_quality_check_failed()
        || record.is_duplicate())
}

fn convert_record(record: &bam::Record, chrom: &Arc<str>) -> AlignedRead {
    let read_id: Arc<str> = Arc::from(String::from_utf8_lossy(record.qname()).as_ref());
    let cigar = record.cigar().iter().map(convert_cigar).collect();
    let sequence = record.seq().as_bytes();
    let qualities: Vec<u8> = record
        .qual()
        .iter()
        .map(|&q| if q == MISSING_QUALITY { 0 } else { q })
        .collect();

    AlignedRead::new(
        read_id,
        Arc::clone(chrom),
        record.pos().max(0) as u64,
        record.mapq(),
        cigar,
        sequence,
        qualities,
        record.is_reverse(),
    )
}

impl AlignmentSource for BamAlignmentSource {
    fn fetch(&mut self, region: &ResolvedRegion) -> Result<ReadStream<'_>, SourceError> {
        let tid = self
            .reader
            .header()
            .tid(region.reference.as_bytes())
            .ok_or_else(|| SourceError::Other(format!("reference '{}' not in BAM header", region.reference)))?;
        let (start, end) = region.zero_based_span();
        self.reader.fetch((tid as i32, start as i64, end as i64))?;

        let chrom = Arc::clone(&region.reference);
        let records = self.reader.records().filter_map(move |result| match result {
            Ok(record) if is_usable(&record) => Some(Ok(convert_record(&record, &chrom))),
            Ok(_) => None,
            Err(err) => Some(Err(SourceError::from(err))),
        });
        Ok(Box::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cigar_operations_map_onto_pileup_kinds() {
        assert_eq!(convert_cigar(&Cigar::Equal(3)), CigarOp::new(CigarOpKind::Match, 3));
        assert_eq!(convert_cigar(&Cigar::Diff(1)), CigarOp::new(CigarOpKind::Match, 1));
        assert_eq!(convert_cigar(&Cigar::Ins(2)), CigarOp::new(CigarOpKind::Insertion, 2));
        assert_eq!(convert_cigar(&Cigar::RefSkip(9)), CigarOp::new(CigarOpKind::RefSkip, 9));
    }

    #[test]
    fn missing_bam_is_an_input_error() {
        let result = BamAlignmentSource::open("/nonexistent/sample.bam");
        assert!(matches!(result, Err(SourceError::Htslib(_))));
    }
}
