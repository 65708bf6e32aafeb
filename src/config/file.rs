use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// `base_caller` section of a pipeline config file.
///
/// Keys keep the short names of the pipeline's configuration surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseCallerSection {
    /// Region string.
    pub region: Option<String>,
    /// Minimum base quality.
    pub minbq: Option<u8>,
    /// Maximum depth.
    pub maxd: Option<u32>,
    /// Minimum depth.
    pub mind: Option<u32>,
    /// Minimum consensus fraction.
    pub minth: Option<f64>,
    /// Bias quality threshold.
    pub biasth: Option<u8>,
    /// Bias factor.
    pub bias: Option<u32>,
    /// Minimum mapping quality.
    pub minmq: Option<u8>,
}

/// Pipeline config file; only the `base_caller` section is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Consensus caller settings.
    #[serde(default)]
    pub base_caller: BaseCallerSection,
}

impl ConfigFile {
    /// Parse a config file from JSON text.
    pub fn from_json(text: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&text, &display)
    }
}
