//! Engine configuration, loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregate::{ClusterAggregator, DEFAULT_SHARD_SIZE};
use crate::error::ClusterError;
use crate::hierarchy::GenerationMode;
use crate::risk::{RiskClassifier, RiskPolicy};
use crate::types::MAX_ZOOM_LEVEL;
use crate::zoom::ZoomPrecisionMap;
use crate::Result;

/// Top-level configuration. Every field has a production default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodgridConfig {
    pub zoom_precision: ZoomPrecisionMap,
    /// Highest zoom level generated.
    pub max_zoom_level: u8,
    pub mode: GenerationMode,
    /// Points per aggregation shard.
    pub shard_size: usize,
    pub risk_policy: RiskPolicy,
}

impl Default for FloodgridConfig {
    fn default() -> Self {
        Self {
            zoom_precision: ZoomPrecisionMap::production(),
            max_zoom_level: MAX_ZOOM_LEVEL,
            mode: GenerationMode::default(),
            shard_size: DEFAULT_SHARD_SIZE,
            risk_policy: RiskPolicy::default(),
        }
    }
}

impl FloodgridConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: FloodgridConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for errors that must stop startup.
    pub fn validate(&self) -> Result<()> {
        self.zoom_precision.validate(self.max_zoom_level)?;
        self.risk_policy.validate()?;
        if self.shard_size == 0 {
            return Err(ClusterError::Config("shard_size must be greater than zero".to_string()));
        }
        if self.mode == GenerationMode::Hierarchical && !self.zoom_precision.is_monotonic(self.max_zoom_level) {
            return Err(ClusterError::Config(
                "hierarchical mode requires precision to be non-decreasing with zoom level".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the aggregator this configuration describes.
    pub fn aggregator(&self) -> Result<ClusterAggregator> {
        let classifier = RiskClassifier::new(self.risk_policy)?;
        Ok(ClusterAggregator::new(self.zoom_precision.clone(), classifier).with_shard_size(self.shard_size))
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<FloodgridConfig> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    FloodgridConfig::from_yaml_str(&contents)
}
