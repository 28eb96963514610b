//! Model training module
//!
//! Provides the trainable-model capability interface, the backends that
//! implement it and the registry that selects a backend by name:
//! - Extra Trees (Extremely Randomized Trees), `"et"`
//! - Neural networks (MLP), `"mlp"`

mod config;
mod models;
pub mod extra_trees;
pub mod neural_network;
pub mod registry;

pub use config::{BackendConfig, ExtraTreesConfig};
pub use models::TrainableModel;
pub use extra_trees::ExtraTrees;
pub use neural_network::{MLPClassifier, MLPConfig, Activation};
pub use registry::{ModelFactory, ModelRegistry};

pub(crate) use models::accuracy;
