//! Caller configuration.
//!
//! [`CallerConfig`] holds every tunable that can change a consensus call. It
//! is assembled once through [`CallerConfigBuilder`] (defaults, then an
//! optional config file, then explicit overrides), validated in
//! [`CallerConfigBuilder::build`], and shared read-only afterwards.
//! Options that only affect how the work is scheduled live in
//! [`ExecutionOptions`].

mod file;

pub use file::{BaseCallerSection, ConfigFile};

use thiserror::Error;

use crate::region::{RegionError, RegionSpec};

/// Default minimum base quality.
pub const DEFAULT_MIN_BASE_QUALITY: u8 = 25;
/// Default cap on observations per column.
pub const DEFAULT_MAX_DEPTH: u32 = 100_000;
/// Default depth floor.
pub const DEFAULT_MIN_DEPTH: u32 = 10;
/// Default fraction of weighted evidence for an unambiguous call.
pub const DEFAULT_MIN_CONSENSUS_FRACTION: f64 = 0.8;
/// Default quality at which bias weighting applies.
pub const DEFAULT_BIAS_QUALITY_THRESHOLD: u8 = 50;
/// Default weight of a high-quality base.
pub const DEFAULT_BIAS_FACTOR: u32 = 10;
/// Default minimum mapping quality (disabled).
pub const DEFAULT_MIN_MAPPING_QUALITY: u8 = 0;

/// Errors produced while assembling a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `min_depth` exceeds `max_depth`.
    #[error("minimum depth {min_depth} exceeds maximum depth {max_depth}")]
    DepthBounds {
        /// Requested depth floor.
        min_depth: u32,
        /// Requested depth cap.
        max_depth: u32,
    },

    /// `max_depth` must be positive.
    #[error("maximum depth must be > 0")]
    ZeroMaxDepth,

    /// `bias_factor` must be at least 1.
    #[error("bias factor must be >= 1 (got {0})")]
    BiasFactor(u32),

    /// `min_consensus_fraction` must lie in `(0, 1]`.
    #[error("minimum consensus fraction must be in (0, 1] (got {0})")]
    ConsensusFraction(f64),

    /// A region in a config file could not be parsed.
    #[error("invalid region in configuration: {0}")]
    Region(#[from] RegionError),

    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying parse failure.
        source: serde_json::Error,
    },
}

/// Immutable tunables shared by every stage of the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerConfig {
    region: Option<RegionSpec>,
    min_base_quality: u8,
    max_depth: u32,
    min_depth: u32,
    min_consensus_fraction: f64,
    bias_quality_threshold: u8,
    bias_factor: u32,
    min_mapping_quality: u8,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            region: None,
            min_base_quality: DEFAULT_MIN_BASE_QUALITY,
            max_depth: DEFAULT_MAX_DEPTH,
            min_depth: DEFAULT_MIN_DEPTH,
            min_consensus_fraction: DEFAULT_MIN_CONSENSUS_FRACTION,
            bias_quality_threshold: DEFAULT_BIAS_QUALITY_THRESHOLD,
            bias_factor: DEFAULT_BIAS_FACTOR,
            min_mapping_quality: DEFAULT_MIN_MAPPING_QUALITY,
        }
    }
}

impl CallerConfig {
    /// Start from the defaults.
    pub fn builder() -> CallerConfigBuilder {
        CallerConfigBuilder::default()
    }

    /// Region restriction, `None` for every reference.
    pub fn region(&self) -> Option<&RegionSpec> {
        self.region.as_ref()
    }

    /// Bases below this quality are not counted.
    pub fn min_base_quality(&self) -> u8 {
        self.min_base_quality
    }

    /// Hard cap on counted observations per column.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Columns with fewer surviving observations are forced to `N`.
    pub fn min_depth(&self) -> u32 {
        self.min_depth
    }

    /// Fraction of weighted evidence required for a symbol to qualify.
    pub fn min_consensus_fraction(&self) -> f64 {
        self.min_consensus_fraction
    }

    /// Bases at or above this quality are weighted by [`Self::bias_factor`].
    pub fn bias_quality_threshold(&self) -> u8 {
        self.bias_quality_threshold
    }

    /// Weight of a base at or above the bias quality threshold.
    pub fn bias_factor(&self) -> u32 {
        self.bias_factor
    }

    /// Reads below this mapping quality contribute nothing.
    pub fn min_mapping_quality(&self) -> u8 {
        self.min_mapping_quality
    }
}

/// Builder applying overrides on top of the defaults.
#[derive(Debug, Clone, Default)]
pub struct CallerConfigBuilder {
    config: CallerConfig,
}

impl CallerConfigBuilder {
    /// Restrict processing to a region.
    pub fn region(mut self, region: Option<RegionSpec>) -> Self {
        self.config.region = region;
        self
    }

    /// Set the minimum base quality.
    pub fn min_base_quality(mut self, value: u8) -> Self {
        self.config.min_base_quality = value;
        self
    }

    /// Set the depth cap.
    pub fn max_depth(mut self, value: u32) -> Self {
        self.config.max_depth = value;
        self
    }

    /// Set the depth floor.
    pub fn min_depth(mut self, value: u32) -> Self {
        self.config.min_depth = value;
        self
    }

    /// Set the consensus fraction threshold.
    pub fn min_consensus_fraction(mut self, value: f64) -> Self {
        self.config.min_consensus_fraction = value;
        self
    }

    /// Set the bias quality threshold.
    pub fn bias_quality_threshold(mut self, value: u8) -> Self {
        self.config.bias_quality_threshold = value;
        self
    }

    /// Set the bias factor.
    pub fn bias_factor(mut self, value: u32) -> Self {
        self.config.bias_factor = value;
        self
    }

    /// Set the minimum mapping quality.
    pub fn min_mapping_quality(mut self, value: u8) -> Self {
        self.config.min_mapping_quality = value;
        self
    }

    /// Apply every value present in a config-file section.
    pub fn apply_section(mut self, section: &BaseCallerSection) -> Result<Self, ConfigError> {
        if let Some(region) = &section.region {
            self.config.region = Some(region.parse()?);
        }
        if let Some(value) = section.minbq {
            self.config.min_base_quality = value;
        }
        if let Some(value) = section.maxd {
            self.config.max_depth = value;
        }
        if let Some(value) = section.mind {
            self.config.min_depth = value;
        }
        if let Some(value) = section.minth {
            self.config.min_consensus_fraction = value;
        }
        if let Some(value) = section.biasth {
            self.config.bias_quality_threshold = value;
        }
        if let Some(value) = section.bias {
            self.config.bias_factor = value;
        }
        if let Some(value) = section.minmq {
            self.config.min_mapping_quality = value;
        }
        Ok(self)
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<CallerConfig, ConfigError> {
        let config = self.config;
        if config.max_depth == 0 {
            return Err(ConfigError::ZeroMaxDepth);
        }
        if config.min_depth > config.max_depth {
            return Err(ConfigError::DepthBounds {
                min_depth: config.min_depth,
                max_depth: config.max_depth,
            });
        }
        if config.bias_factor < 1 {
            return Err(ConfigError::BiasFactor(config.bias_factor));
        }
        let fraction = config.min_consensus_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::ConsensusFraction(fraction));
        }
        Ok(config)
    }
}

/// Scheduling options; they never change the calls produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Worker threads for column evaluation (`<= 1` runs serially).
    pub threads: usize,
    /// Columns materialised per parallel batch.
    pub batch_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            batch_size: 4096,
        }
    }
}

impl ExecutionOptions {
    /// Serial evaluation.
    pub fn serial() -> Self {
        Self::default()
    }

    /// Parallel evaluation over `threads` workers.
    pub fn parallel(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Override the batch size (at least one column).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Whether a worker pool is used.
    pub fn is_parallel(&self) -> bool {
        self.threads > 1
    }
}
