//! Genomic data model: aligned reads, observed and called symbols, pileup
//! construction and alignment sources.
//!
//! Everything downstream of [`PileupBuilder`] works on [`PileupColumn`]s and
//! never touches reads directly.

mod io;
mod pileup;
mod statistics;
mod symbol;
mod types;

pub use io::BamAlignmentSource;
pub use pileup::{
    AlignedBaseObservation, AlignmentSource, InMemorySource, PileupBuilder, PileupColumn,
    PileupColumns, ReadStream, SourceError,
};
pub use statistics::{
    column_statistics, write_statistics, ColumnStatistics, PositionStatistics,
    StatisticsSettings, SymbolStatistics,
};
pub use symbol::{iupac_code, CalledSymbol, Symbol};
pub use types::{AlignedRead, CigarOp, CigarOpKind, Strand};
