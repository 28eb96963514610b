//! Backend hyperparameter configuration

use super::neural_network::MLPConfig;
use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};

/// Extra Trees hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraTreesConfig {
    /// Number of trees in the ensemble
    pub n_estimators: usize,
    /// Maximum tree depth (None = grow until pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (None = sqrt of the feature count)
    pub max_features: Option<usize>,
    /// Base seed; tree `i` is seeded with `random_state + i`
    pub random_state: u64,
}

impl Default for ExtraTreesConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(20),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 42,
        }
    }
}

impl ExtraTreesConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, mf: usize) -> Self {
        self.max_features = Some(mf);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Configuration for every built-in backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub extra_trees: ExtraTreesConfig,
    pub mlp: MLPConfig,
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.extra_trees.n_estimators == 0 {
            return Err(TrackError::Config("extra_trees.n_estimators must be > 0".to_string()));
        }
        if self.extra_trees.min_samples_split < 2 {
            return Err(TrackError::Config(
                "extra_trees.min_samples_split must be >= 2".to_string(),
            ));
        }
        if self.mlp.hidden_layers.is_empty() || self.mlp.hidden_layers.contains(&0) {
            return Err(TrackError::Config(
                "mlp.hidden_layers must list at least one non-empty layer".to_string(),
            ));
        }
        if self.mlp.batch_size == 0 {
            return Err(TrackError::Config("mlp.batch_size must be > 0".to_string()));
        }
        if self.mlp.max_epochs == 0 {
            return Err(TrackError::Config("mlp.max_epochs must be > 0".to_string()));
        }
        if !(self.mlp.learning_rate > 0.0) {
            return Err(TrackError::Config("mlp.learning_rate must be > 0".to_string()));
        }
        Ok(())
    }
}
