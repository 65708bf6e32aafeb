use crate::genomics::{AlignedBaseObservation, PileupColumn};

/// Observations of one column that met the base-quality floor.
#[derive(Debug, Clone)]
pub struct QualityFiltered<'a> {
    /// Passing observations in arrival order.
    pub passing: Vec<&'a AlignedBaseObservation>,
    /// Observations before filtering.
    pub raw_depth: u32,
}

impl QualityFiltered<'_> {
    /// Observations removed by the filter.
    pub fn filtered_out(&self) -> u32 {
        self.raw_depth - self.passing.len() as u32
    }
}

/// Drop observations with `quality < min_base_quality`.
///
/// Dropped observations still count towards the raw depth.
pub fn filter_by_quality(column: &PileupColumn, min_base_quality: u8) -> QualityFiltered<'_> {
    let passing = column
        .observations
        .iter()
        .filter(|obs| obs.quality >= min_base_quality)
        .collect();
    QualityFiltered {
        passing,
        raw_depth: column.raw_depth(),
    }
}
