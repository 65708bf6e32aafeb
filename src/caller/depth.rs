use crate::caller::QualityFiltered;
use crate::genomics::AlignedBaseObservation;

/// Outcome of depth regulation for one column.
#[derive(Debug, Clone)]
pub struct RegulatedColumn<'a> {
    /// Observations admitted to the tally (empty for forced no-calls).
    pub observations: Vec<&'a AlignedBaseObservation>,
    /// Quality-passing observations kept after the depth cap.
    pub surviving_depth: u32,
    /// Quality-passing observations dropped by the depth cap.
    pub excess_depth: u32,
    /// Observations before any filtering.
    pub raw_depth: u32,
    /// Whether the column bypasses the tally and is called `N`.
    pub forced_no_call: bool,
}

/// Cap surviving observations at `max_depth` and apply the `min_depth` floor.
///
/// The first `max_depth` passing observations in arrival order are kept. A
/// column with fewer than `min_depth` survivors, or with none at all, is a
/// forced no-call.
pub fn regulate_depth(
    filtered: QualityFiltered<'_>,
    max_depth: u32,
    min_depth: u32,
) -> RegulatedColumn<'_> {
    let QualityFiltered {
        mut passing,
        raw_depth,
    } = filtered;

    let passing_depth = passing.len() as u32;
    let excess_depth = passing_depth.saturating_sub(max_depth);
    passing.truncate(max_depth as usize);
    let surviving_depth = passing.len() as u32;

    let forced_no_call = surviving_depth == 0 || surviving_depth < min_depth;
    if forced_no_call {
        passing.clear();
    }

    RegulatedColumn {
        observations: passing,
        surviving_depth,
        excess_depth,
        raw_depth,
        forced_no_call,
    }
}
