//! Model registry: maps model-type identifiers to backend factories

use super::config::BackendConfig;
use super::extra_trees::{self, ExtraTrees};
use super::models::TrainableModel;
use super::neural_network::{self, MLPClassifier};
use crate::error::{Result, TrackError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Zero-argument constructor for an untrained backend instance
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn TrainableModel> + Send + Sync>;

/// Registry of trainable backends.
///
/// Populated once at start-up, then shared read-only (typically behind an
/// `Arc`) by every pipeline and artifact store.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: HashMap<String, ModelFactory>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in backend configured from `config`
    pub fn builtin(config: &BackendConfig) -> Self {
        let mut registry = Self::new();
        registry.register_builtin(config);
        registry
    }

    /// Register the built-in backends. Calling this twice leaves the same set.
    pub fn register_builtin(&mut self, config: &BackendConfig) {
        let et = config.extra_trees.clone();
        self.register(extra_trees::MODEL_TYPE, move || {
            Box::new(ExtraTrees::new(et.clone())) as Box<dyn TrainableModel>
        });

        let mlp = config.mlp.clone();
        self.register(neural_network::MODEL_TYPE, move || {
            Box::new(MLPClassifier::new(mlp.clone())) as Box<dyn TrainableModel>
        });
    }

    /// Associate `name` with `factory`, replacing any previous registration
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn TrainableModel> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            debug!(model_type = %name, "replaced model factory");
        } else {
            debug!(model_type = %name, "registered model factory");
        }
    }

    /// A fresh, untrained instance of `name`
    pub fn resolve(&self, name: &str) -> Result<Box<dyn TrainableModel>> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(TrackError::UnknownModelType {
                name: name.to_string(),
                available: self.names().join(", "),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
