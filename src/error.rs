//! Error types for the CRTC training pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crtc-ml operations
pub type Result<T> = std::result::Result<T, TrackError>;

/// Main error type for loading, training, evaluation and persistence
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Malformed SVM data in {path}:{line}: {reason}")]
    DataFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("No parsable records found in {path}")]
    EmptyDataset { path: PathBuf },

    #[error("Unknown model type '{name}' (available: {available})")]
    UnknownModelType { name: String, available: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not trained")]
    NotTrained,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Corrupt model artifact {path}: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrackError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrackError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        TrackError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        TrackError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for TrackError {
    fn from(err: bincode::Error) -> Self {
        TrackError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrackError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrackError::ShapeMismatch {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
