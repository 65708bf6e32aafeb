//! Region strings of the form `REFERENCE[:START[-STOP]]`.
//!
//! Coordinates are 1-based and inclusive, as in samtools region strings.
//! Parsing is pure; resolution validates against a [`ReferenceCatalog`] and
//! clamps the stop coordinate to the reference length.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while parsing or resolving a region.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// The region string could not be parsed.
    #[error("malformed region '{0}': expected REFERENCE:START-STOP")]
    Malformed(String),

    /// A coordinate was zero (coordinates are 1-based).
    #[error("region '{0}' has a non-positive bound")]
    NonPositiveBound(String),

    /// Start lies after stop.
    #[error("region start {start} is after stop {stop}")]
    StartAfterStop {
        /// Requested start.
        start: u64,
        /// Requested stop.
        stop: u64,
    },

    /// The reference is not known to the alignment source.
    #[error("unknown reference '{0}'")]
    UnknownReference(String),

    /// Start lies beyond the end of the reference.
    #[error("region start {start} is beyond the end of '{reference}' (length {length})")]
    StartBeyondReference {
        /// Reference name.
        reference: String,
        /// Requested start.
        start: u64,
        /// Reference length.
        length: u64,
    },

    /// The reference has no bases at all.
    #[error("reference '{0}' is empty")]
    EmptyReference(String),
}

/// Names and lengths of the references an alignment source knows about.
pub trait ReferenceCatalog {
    /// References in their natural (header) order.
    fn references(&self) -> Vec<(Arc<str>, u64)>;

    /// Length of the named reference, if known.
    fn reference_length(&self, name: &str) -> Option<u64> {
        self.references()
            .into_iter()
            .find(|(candidate, _)| candidate.as_ref() == name)
            .map(|(_, len)| len)
    }
}

/// Parsed but unvalidated region request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    /// Reference name.
    pub reference: String,
    /// Requested start (1-based), if any.
    pub start: Option<u64>,
    /// Requested stop (1-based, inclusive), if any.
    pub stop: Option<u64>,
}

impl RegionSpec {
    /// Region covering the whole named reference.
    pub fn whole(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            start: None,
            stop: None,
        }
    }

    /// Validate against the catalog and produce a closed interval.
    pub fn resolve(&self, catalog: &dyn ReferenceCatalog) -> Result<ResolvedRegion, RegionError> {
        let length = catalog
            .reference_length(&self.reference)
            .ok_or_else(|| RegionError::UnknownReference(self.reference.clone()))?;
        if length == 0 {
            return Err(RegionError::EmptyReference(self.reference.clone()));
        }

        let start = self.start.unwrap_or(1);
        let requested_stop = self.stop.unwrap_or(length);
        if start > requested_stop {
            return Err(RegionError::StartAfterStop {
                start,
                stop: requested_stop,
            });
        }
        if start > length {
            return Err(RegionError::StartBeyondReference {
                reference: self.reference.clone(),
                start,
                length,
            });
        }

        Ok(ResolvedRegion {
            reference: Arc::from(self.reference.as_str()),
            start,
            stop: requested_stop.min(length),
        })
    }
}

fn parse_coordinate(raw: &str, region: &str) -> Result<u64, RegionError> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RegionError::Malformed(region.to_string()));
    }
    let value: u64 = cleaned
        .parse()
        .map_err(|_| RegionError::Malformed(region.to_string()))?;
    if value == 0 {
        return Err(RegionError::NonPositiveBound(region.to_string()));
    }
    Ok(value)
}

impl FromStr for RegionSpec {
    type Err = RegionError;

    fn from_str(region: &str) -> Result<Self, Self::Err> {
        let region = region.trim();
        if region.is_empty() {
            return Err(RegionError::Malformed(region.to_string()));
        }

        // Reference names may themselves contain ':', so only the last
        // separator can introduce coordinates.
        let Some((reference, range)) = region.rsplit_once(':') else {
            return Ok(Self::whole(region));
        };
        if reference.is_empty() {
            return Err(RegionError::Malformed(region.to_string()));
        }
        if range.starts_with('-') {
            return Err(RegionError::NonPositiveBound(region.to_string()));
        }

        let (start, stop) = match range.split_once('-') {
            Some((start, stop)) => {
                let start = parse_coordinate(start, region)?;
                let stop = parse_coordinate(stop, region)?;
                (start, stop)
            }
            None => {
                let single = parse_coordinate(range, region)?;
                (single, single)
            }
        };

        if start > stop {
            return Err(RegionError::StartAfterStop { start, stop });
        }

        Ok(Self {
            reference: reference.to_string(),
            start: Some(start),
            stop: Some(stop),
        })
    }
}

/// Closed, validated interval on one reference (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedRegion {
    /// Reference name.
    pub reference: Arc<str>,
    /// First position (1-based).
    pub start: u64,
    /// Last position (1-based, inclusive).
    pub stop: u64,
}

impl ResolvedRegion {
    /// Number of reference positions in the region.
    pub fn len(&self) -> u64 {
        self.stop - self.start + 1
    }

    /// Always false: a resolved region covers at least one position.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// 0-based half-open span, as used by BAM indexes.
    pub fn zero_based_span(&self) -> (u64, u64) {
        (self.start - 1, self.stop)
    }
}

impl fmt::Display for ResolvedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.reference, self.start, self.stop)
    }
}

/// Resolve an optional region request into the list of regions to process.
///
/// Without a request every reference in the catalog is processed in full.
pub fn resolve_regions(
    spec: Option<&RegionSpec>,
    catalog: &dyn ReferenceCatalog,
) -> Result<Vec<ResolvedRegion>, RegionError> {
    match spec {
        Some(spec) => Ok(vec![spec.resolve(catalog)?]),
        None => catalog
            .references()
            .into_iter()
            .filter(|(_, length)| *length > 0)
            .map(|(name, _)| RegionSpec::whole(name.as_ref()).resolve(catalog))
            .collect(),
    }
}
