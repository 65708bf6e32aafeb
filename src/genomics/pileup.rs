use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

use crate::genomics::{AlignedRead, CigarOpKind, Strand, Symbol};
use crate::region::{ReferenceCatalog, ResolvedRegion};

/// Errors raised by an alignment source or while turning its reads into columns.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failure reported by htslib while reading BAM data.
    #[error("alignment input error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    /// Plain I/O failure.
    #[error("alignment input I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reads arrived out of coordinate order.
    #[error("read '{read_id}' at {pos} arrived after a read at {previous}; input must be coordinate-sorted")]
    Unsorted {
        /// Offending read.
        read_id: String,
        /// Its 0-based start.
        pos: u64,
        /// Start of the previous read.
        previous: u64,
    },

    /// A read whose CIGAR, sequence and qualities disagree.
    #[error("malformed read '{read_id}': {reason}")]
    MalformedRead {
        /// Offending read.
        read_id: String,
        /// What is inconsistent.
        reason: String,
    },

    /// Any other failure reported by a custom source.
    #[error("alignment source failed: {0}")]
    Other(String),
}

/// Forward-only stream of coordinate-sorted reads.
pub type ReadStream<'a> = Box<dyn Iterator<Item = Result<AlignedRead, SourceError>> + 'a>;

/// Capability the caller needs from an alignment collaborator.
///
/// A source knows its references and can stream, in coordinate order, every
/// read overlapping a region. Each call to [`AlignmentSource::fetch`] starts a
/// fresh single pass.
pub trait AlignmentSource: ReferenceCatalog {
    /// Stream reads overlapping `region`.
    fn fetch(&mut self, region: &ResolvedRegion) -> Result<ReadStream<'_>, SourceError>;
}

/// One read's contribution to one pileup column.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedBaseObservation {
    /// Observed symbol.
    pub symbol: Symbol,
    /// Phred base quality.
    pub quality: u8,
    /// Strand of the contributing read.
    pub strand: Strand,
    /// Name of the contributing read.
    pub read_id: Arc<str>,
    /// Mapping quality of the contributing read.
    pub mapq: u8,
}

/// Every observation overlapping one reference position.
#[derive(Debug, Clone, PartialEq)]
pub struct PileupColumn {
    /// Reference name.
    pub reference: Arc<str>,
    /// 1-based reference position.
    pub position: u64,
    /// Observations in read arrival order.
    pub observations: Vec<AlignedBaseObservation>,
}

impl PileupColumn {
    /// Column without any coverage.
    pub fn empty(reference: Arc<str>, position: u64) -> Self {
        Self {
            reference,
            position,
            observations: Vec::new(),
        }
    }

    /// Number of observations before any filtering.
    pub fn raw_depth(&self) -> u32 {
        self.observations.len() as u32
    }
}

/// Per-position observations of a single read, in ascending position order.
#[derive(Debug)]
struct ActiveRead {
    events: VecDeque<(u64, AlignedBaseObservation)>,
}

/// Expand a read into `(1-based position, observation)` events.
///
/// An insertion replaces the observation of the base it follows; a deletion
/// yields gaps whose quality is the lower of the flanking base qualities.
fn expand_read(read: &AlignedRead) -> Result<VecDeque<(u64, AlignedBaseObservation)>, SourceError> {
    let malformed = |reason: String| SourceError::MalformedRead {
        read_id: read.read_id.to_string(),
        reason,
    };
    if read.qualities.len() != read.sequence.len() {
        return Err(malformed(format!(
            "{} qualities for {} bases",
            read.qualities.len(),
            read.sequence.len()
        )));
    }
    if read.query_span() != read.sequence.len() {
        return Err(malformed(format!(
            "CIGAR consumes {} bases but sequence has {}",
            read.query_span(),
            read.sequence.len()
        )));
    }

    let observation = |symbol: Symbol, quality: u8| AlignedBaseObservation {
        symbol,
        quality,
        strand: read.strand,
        read_id: Arc::clone(&read.read_id),
        mapq: read.mapq,
    };

    let mut events = VecDeque::with_capacity(read.reference_span() as usize);
    let mut ref_pos = read.pos + 1;
    let mut query = 0usize;

    for op in &read.cigar {
        let len = op.len as usize;
        match op.kind {
            CigarOpKind::Match => {
                for offset in query..query + len {
                    let symbol = Symbol::from_base(read.sequence[offset]);
                    events.push_back((ref_pos, observation(symbol, read.qualities[offset])));
                    ref_pos += 1;
                }
                query += len;
            }
            CigarOpKind::Insertion => {
                let inserted = &read.sequence[query..query + len];
                let inserted_quality = read.qualities[query..query + len].iter().copied().min();
                // Insertions without an aligned anchor base are dropped.
                if let (Some((_, anchor)), Some(inserted_quality)) =
                    (events.back_mut(), inserted_quality)
                {
                    if !matches!(anchor.symbol, Symbol::Gap | Symbol::Insertion(_)) {
                        let mut sequence = anchor.symbol.to_string().into_bytes();
                        sequence.extend(inserted.iter().map(u8::to_ascii_uppercase));
                        anchor.symbol = Symbol::Insertion(Arc::from(sequence.into_boxed_slice()));
                        anchor.quality = anchor.quality.min(inserted_quality);
                    }
                }
                query += len;
            }
            CigarOpKind::Deletion => {
                let before = query.checked_sub(1).and_then(|i| read.quality_at(i));
                let after = read.quality_at(query);
                let quality = match (before, after) {
                    (Some(a), Some(b)) => a.min(b),
                    (Some(q), None) | (None, Some(q)) => q,
                    (None, None) => 0,
                };
                for _ in 0..len {
                    events.push_back((ref_pos, observation(Symbol::Gap, quality)));
                    ref_pos += 1;
                }
            }
            CigarOpKind::RefSkip => ref_pos += u64::from(op.len),
            CigarOpKind::SoftClip => query += len,
            CigarOpKind::HardClip | CigarOpKind::Pad => {}
        }
    }

    Ok(events)
}

/// Turns a read stream into pileup columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PileupBuilder {
    min_mapping_quality: u8,
}

impl PileupBuilder {
    /// Builder dropping reads below `min_mapping_quality`.
    pub fn new(min_mapping_quality: u8) -> Self {
        Self {
            min_mapping_quality,
        }
    }

    /// Lazily produce one column per position of `region`.
    pub fn columns<'a>(&self, reads: ReadStream<'a>, region: ResolvedRegion) -> PileupColumns<'a> {
        PileupColumns {
            reads,
            pending: None,
            next_position: region.start,
            region,
            active: Vec::new(),
            min_mapping_quality: self.min_mapping_quality,
            last_read_pos: None,
            exhausted: false,
            failed: false,
        }
    }
}

/// Position-ordered, gapless column iterator over one region.
///
/// The iterator is single-pass. After yielding an error it yields nothing
/// more; every column produced before the error is complete.
pub struct PileupColumns<'a> {
    reads: ReadStream<'a>,
    pending: Option<AlignedRead>,
    region: ResolvedRegion,
    next_position: u64,
    active: Vec<ActiveRead>,
    min_mapping_quality: u8,
    last_read_pos: Option<u64>,
    exhausted: bool,
    failed: bool,
}

impl std::fmt::Debug for PileupColumns<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PileupColumns")
            .field("region", &self.region)
            .field("next_position", &self.next_position)
            .field("active_reads", &self.active.len())
            .finish()
    }
}

impl PileupColumns<'_> {
    /// Region the columns cover.
    pub fn region(&self) -> &ResolvedRegion {
        &self.region
    }

    fn next_read(&mut self) -> Option<Result<AlignedRead, SourceError>> {
        if let Some(read) = self.pending.take() {
            return Some(Ok(read));
        }
        if self.exhausted {
            return None;
        }
        let next = self.reads.next();
        if next.is_none() {
            self.exhausted = true;
        }
        next
    }

    /// Admit every read starting at or before `position` into the active set.
    fn admit_reads(&mut self, position: u64) -> Result<(), SourceError> {
        while let Some(read) = self.next_read() {
            let read = read?;
            if read.pos + 1 > position {
                self.pending = Some(read);
                break;
            }
            if let Some(previous) = self.last_read_pos {
                if read.pos < previous {
                    return Err(SourceError::Unsorted {
                        read_id: read.read_id.to_string(),
                        pos: read.pos,
                        previous,
                    });
                }
            }
            self.last_read_pos = Some(read.pos);

            if read.chrom != self.region.reference
                || read.mapq < self.min_mapping_quality
                || read.is_empty()
            {
                continue;
            }
            let mut events = expand_read(&read)?;
            while events.front().is_some_and(|(pos, _)| *pos < position) {
                events.pop_front();
            }
            if !events.is_empty() {
                self.active.push(ActiveRead { events });
            }
        }
        Ok(())
    }
}

impl Iterator for PileupColumns<'_> {
    type Item = Result<PileupColumn, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_position > self.region.stop {
            return None;
        }
        let position = self.next_position;

        if let Err(err) = self.admit_reads(position) {
            self.failed = true;
            return Some(Err(err));
        }

        let mut column = PileupColumn::empty(Arc::clone(&self.region.reference), position);
        for read in &mut self.active {
            if read.events.front().is_some_and(|(pos, _)| *pos == position) {
                if let Some((_, observation)) = read.events.pop_front() {
                    column.observations.push(observation);
                }
            }
        }
        self.active.retain(|read| !read.events.is_empty());

        self.next_position += 1;
        Some(Ok(column))
    }
}

/// Alignment source backed by reads held in memory.
///
/// Reads are kept in coordinate order (stable for equal starts), which makes
/// it a convenient stand-in for synthetic pileups.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    references: Vec<(Arc<str>, u64)>,
    reads: Vec<AlignedRead>,
}

impl InMemorySource {
    /// Create a source from reference lengths and reads.
    pub fn new(references: Vec<(Arc<str>, u64)>, mut reads: Vec<AlignedRead>) -> Self {
        reads.sort_by_key(|read| read.pos);
        Self { references, reads }
    }
}

impl ReferenceCatalog for InMemorySource {
    fn references(&self) -> Vec<(Arc<str>, u64)> {
        self.references.clone()
    }
}

impl AlignmentSource for InMemorySource {
    fn fetch(&mut self, region: &ResolvedRegion) -> Result<ReadStream<'_>, SourceError> {
        let (start, end) = region.zero_based_span();
        let reference = Arc::clone(&region.reference);
        Ok(Box::new(
            self.reads
                .iter()
                .filter(move |read| {
                    read.chrom == reference && read.pos < end && read.end() > start
                })
                .cloned()
                .map(Ok),
        ))
    }
}
