//! Pipeline configuration

use crate::data::LoaderConfig;
use crate::error::{Result, TrackError};
use crate::training::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a training or evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub loader: LoaderConfig,
    pub backends: BackendConfig,
    /// Label marking a true track
    pub positive_label: f64,
    /// Score above which a candidate counts as a track
    pub decision_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            backends: BackendConfig::default(),
            positive_label: 1.0,
            decision_threshold: 0.5,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TrackError::io(path, e))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| TrackError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_backends(mut self, backends: BackendConfig) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_decision_threshold(mut self, threshold: f64) -> Self {
        self.decision_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.backends.validate()?;
        if self.loader.num_features == Some(0) {
            return Err(TrackError::Config("loader.num_features must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(TrackError::Config(format!(
                "decision_threshold must lie in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        if !self.positive_label.is_finite() {
            return Err(TrackError::Config("positive_label must be finite".to_string()));
        }
        Ok(())
    }
}
