use std::fmt;
use std::sync::Arc;

/// Symbol a single read contributes to a pileup column.
///
/// The derived ordering is the fixed tie-break priority used by the caller:
/// `A < C < G < T < N < gap < insertions`, with insertions ordered by their
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// Adenine.
    A,
    /// Cytosine.
    C,
    /// Guanine.
    G,
    /// Thymine (uracil is folded into `T`).
    T,
    /// Unknown base reported by the sequencer.
    N,
    /// Deleted reference base.
    Gap,
    /// Anchor base followed by the bases inserted after it.
    Insertion(Arc<[u8]>),
}

impl Symbol {
    /// Map an ASCII base to a symbol; anything outside `ACGTU` is `N`.
    pub fn from_base(base: u8) -> Self {
        match base {
            b'A' | b'a' => Self::A,
            b'C' | b'c' => Self::C,
            b'G' | b'g' => Self::G,
            b'T' | b't' | b'U' | b'u' => Self::T,
            _ => Self::N,
        }
    }

    /// Bit used for this nucleotide in IUPAC masks, `None` for non-nucleotides.
    pub fn nucleotide_bit(&self) -> Option<u8> {
        match self {
            Self::A => Some(0b0001),
            Self::C => Some(0b0010),
            Self::G => Some(0b0100),
            Self::T => Some(0b1000),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::C => f.write_str("C"),
            Self::G => f.write_str("G"),
            Self::T => f.write_str("T"),
            Self::N => f.write_str("N"),
            Self::Gap => f.write_str("-"),
            Self::Insertion(seq) => f.write_str(&String::from_utf8_lossy(seq)),
        }
    }
}

/// IUPAC code for a set of nucleotides encoded as an `ACGT` bit mask.
///
/// Single bases map to themselves, the full set maps to `N`.
pub fn iupac_code(mask: u8) -> Option<u8> {
    let code = match mask {
        0b0001 => b'A',
        0b0010 => b'C',
        0b0100 => b'G',
        0b1000 => b'T',
        0b0011 => b'M',
        0b0101 => b'R',
        0b1001 => b'W',
        0b0110 => b'S',
        0b1010 => b'Y',
        0b1100 => b'K',
        0b0111 => b'V',
        0b1011 => b'H',
        0b1101 => b'D',
        0b1110 => b'B',
        0b1111 => b'N',
        _ => return None,
    };
    Some(code)
}

/// Symbol emitted for one reference position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CalledSymbol {
    /// One of `A`, `C`, `G`, `T`.
    Base(u8),
    /// Two- or three-way IUPAC ambiguity code.
    Ambiguity(u8),
    /// The position is deleted in the consensus.
    Gap,
    /// Anchor base plus inserted bases.
    Insertion(Arc<[u8]>),
    /// No call.
    N,
}

impl CalledSymbol {
    /// Called symbol for a single winning pileup symbol.
    pub fn from_symbol(symbol: &Symbol) -> Self {
        match symbol {
            Symbol::A => Self::Base(b'A'),
            Symbol::C => Self::Base(b'C'),
            Symbol::G => Self::Base(b'G'),
            Symbol::T => Self::Base(b'T'),
            Symbol::N => Self::N,
            Symbol::Gap => Self::Gap,
            Symbol::Insertion(seq) => Self::Insertion(Arc::clone(seq)),
        }
    }

    /// Called symbol for a set of symbols that all met the consensus threshold.
    ///
    /// Sets made only of nucleotides map to their IUPAC code; any set touching
    /// a gap, an insertion or `N` cannot be expressed that way and is `N`.
    pub fn from_symbol_set<'a>(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        let mut mask = 0u8;
        for symbol in symbols {
            match symbol.nucleotide_bit() {
                Some(bit) => mask |= bit,
                None => return Self::N,
            }
        }
        match iupac_code(mask) {
            Some(b'N') | None => Self::N,
            Some(code) if mask.count_ones() == 1 => Self::Base(code),
            Some(code) => Self::Ambiguity(code),
        }
    }

    /// Bases contributed to a consensus sequence (gaps contribute nothing).
    pub fn consensus_bytes(&self) -> &[u8] {
        match self {
            Self::Base(code) | Self::Ambiguity(code) => std::slice::from_ref(code),
            Self::Gap => &[],
            Self::Insertion(seq) => seq,
            Self::N => b"N",
        }
    }
}

impl fmt::Display for CalledSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(code) | Self::Ambiguity(code) => write!(f, "{}", *code as char),
            Self::Gap => f.write_str("-"),
            Self::Insertion(seq) => f.write_str(&String::from_utf8_lossy(seq)),
            Self::N => f.write_str("N"),
        }
    }
}
