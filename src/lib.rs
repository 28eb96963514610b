//! crtc-ml - CLAS12 track classifier training
//!
//! Loads labelled track candidates in SVM-light format, trains a registered
//! backend, evaluates it and writes a self-describing model artifact.
//!
//! # Modules
//!
//! - [`data`] - SVM-light parsing, directory loading, track segments
//! - [`training`] - Trainable model interface, backends, model registry
//! - [`evaluation`] - Classification and track-finding metrics
//! - [`export`] - Model artifacts
//! - [`pipeline`] - Staged train/evaluate/persist orchestration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data and models
pub mod data;
pub mod training;
pub mod evaluation;
pub mod export;

// Orchestration
pub mod pipeline;
pub mod cli;

pub use error::{Result, TrackError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TrackError};

    // Data
    pub use crate::data::{Dataset, DatasetLoader, LoaderConfig};

    // Training
    pub use crate::training::{
        BackendConfig, ExtraTrees, ExtraTreesConfig, MLPClassifier, MLPConfig, ModelRegistry,
        TrainableModel,
    };

    // Evaluation
    pub use crate::evaluation::{EvaluationReport, MetricsEvaluator, TrackFindingMetrics};

    // Export
    pub use crate::export::{ArtifactStore, ModelMetadata, TrainedModel};

    // Pipeline
    pub use crate::pipeline::{
        EvaluationOutcome, Pipeline, PipelineConfig, PipelineState, StageError, TrainOutcome,
        TrainRequest,
    };
}
