//! Model artifact serialization
//!
//! An artifact is a bincode envelope holding magic bytes, a format version,
//! the model metadata (including the model-type identifier) and the backend's
//! own serialized payload with its checksum. The model type in the header is
//! enough to pick the backend on load.

use crate::error::{Result, TrackError};
use crate::training::{ModelRegistry, TrainableModel};
use bincode::Options;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

/// Magic bytes for crtc-ml model files
const MAGIC: [u8; 4] = *b"CRTC";
/// Current format version
const FORMAT_VERSION: u32 = 1;

/// Model metadata stored in the artifact header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Registry identifier of the backend
    pub model_type: String,
    /// crtc-ml version that wrote the artifact
    pub version: String,
    pub trained_at: DateTime<Utc>,
    /// Directory the training data came from
    pub training_dir: String,
    /// Training files, in load order
    pub training_files: Vec<String>,
    pub n_features: usize,
    pub n_samples: usize,
    /// Class labels seen during training, ascending
    pub classes: Vec<f64>,
    pub hyperparameters: BTreeMap<String, String>,
    /// Training and evaluation metrics
    pub metrics: BTreeMap<String, f64>,
}

impl ModelMetadata {
    /// Create new metadata stamped with the current time
    pub fn new(model_type: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            training_dir: String::new(),
            training_files: Vec::new(),
            n_features: 0,
            n_samples: 0,
            classes: Vec::new(),
            hyperparameters: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// Set training data provenance
    pub fn with_training_source(mut self, dir: &Path, files: &[PathBuf]) -> Self {
        self.training_dir = dir.display().to_string();
        self.training_files = files.iter().map(|f| f.display().to_string()).collect();
        self
    }

    /// Set the training data shape and classes
    pub fn with_shape(mut self, n_samples: usize, n_features: usize, classes: Vec<f64>) -> Self {
        self.n_samples = n_samples;
        self.n_features = n_features;
        self.classes = classes;
        self
    }

    pub fn with_hyperparameters(mut self, params: BTreeMap<String, String>) -> Self {
        self.hyperparameters = params;
        self
    }

    /// Add metric
    pub fn add_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// A trained backend together with its metadata
#[derive(Debug)]
pub struct TrainedModel {
    metadata: ModelMetadata,
    model: Box<dyn TrainableModel>,
}

impl TrainedModel {
    /// Pair a trained backend with its metadata
    pub fn new(model: Box<dyn TrainableModel>, metadata: ModelMetadata) -> Result<Self> {
        if !model.is_trained() {
            return Err(TrackError::NotTrained);
        }
        if model.model_type() != metadata.model_type {
            return Err(TrackError::Config(format!(
                "metadata names model type '{}' but the model is '{}'",
                metadata.model_type,
                model.model_type()
            )));
        }
        Ok(Self { metadata, model })
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn model_type(&self) -> &str {
        &self.metadata.model_type
    }

    pub fn model(&self) -> &dyn TrainableModel {
        self.model.as_ref()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict(x)
    }

    pub fn positive_scores(&self, x: &Array2<f64>, positive: f64) -> Result<Array1<f64>> {
        self.model.positive_scores(x, positive)
    }

    pub fn into_parts(self) -> (Box<dyn TrainableModel>, ModelMetadata) {
        (self.model, self.metadata)
    }
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactEnvelope {
    magic: [u8; 4],
    format_version: u32,
    metadata: ModelMetadata,
    payload: Vec<u8>,
    checksum: u64,
}

fn envelope_options() -> impl Options {
    bincode::DefaultOptions::new()
}

/// Saves and restores trained models, resolving backends through a registry
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    registry: Arc<ModelRegistry>,
}

impl ArtifactStore {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Write `model` to `path`.
    ///
    /// The bytes go to a hidden sibling file that is renamed into place, so a
    /// failed save never leaves a truncated artifact at `path`.
    pub fn save(&self, model: &TrainedModel, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let payload = model.model.serialize()?;
        let envelope = ArtifactEnvelope {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            metadata: model.metadata.clone(),
            checksum: xxh3_64(&payload),
            payload,
        };
        let bytes = envelope_options()
            .serialize(&envelope)
            .map_err(|e| TrackError::Serialization(format!("Failed to serialize artifact: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
        }

        let tmp = staging_path(path)?;
        if let Err(e) = fs::write(&tmp, &bytes).and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(TrackError::io(path, e));
        }

        info!(
            path = %path.display(),
            model_type = %model.metadata.model_type,
            bytes = bytes.len(),
            "saved model artifact"
        );
        Ok(())
    }

    /// Read only the metadata header of an artifact
    pub fn read_header(&self, path: impl AsRef<Path>) -> Result<ModelMetadata> {
        Ok(read_envelope(path.as_ref())?.metadata)
    }

    /// Restore a trained model, picking the backend named in the header
    pub fn load(&self, path: impl AsRef<Path>) -> Result<TrainedModel> {
        let path = path.as_ref();
        let envelope = read_envelope(path)?;
        let corrupt = |reason: String| TrackError::CorruptArtifact {
            path: path.to_path_buf(),
            reason,
        };

        let model_type = envelope.metadata.model_type.clone();
        let mut model = match self.registry.resolve(&model_type) {
            Ok(model) => model,
            Err(TrackError::UnknownModelType { available, .. }) => {
                return Err(corrupt(format!(
                    "model type '{}' is not registered (available: {})",
                    model_type, available
                )))
            }
            Err(e) => return Err(e),
        };

        model
            .deserialize(&envelope.payload)
            .map_err(|e| corrupt(format!("{} payload rejected: {}", model_type, e)))?;

        if !model.is_trained() {
            return Err(corrupt("payload holds an untrained model".to_string()));
        }
        if model.n_features() != Some(envelope.metadata.n_features) {
            return Err(corrupt(format!(
                "header declares {} features, payload has {:?}",
                envelope.metadata.n_features,
                model.n_features()
            )));
        }

        debug!(path = %path.display(), model_type = %model_type, "loaded model artifact");
        TrainedModel::new(model, envelope.metadata)
    }
}

fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        TrackError::Config(format!("artifact path {} has no file name", path.display()))
    })?;
    let mut staged = std::ffi::OsString::from(".");
    staged.push(name);
    staged.push(".partial");
    Ok(path.with_file_name(staged))
}

fn read_envelope(path: &Path) -> Result<ArtifactEnvelope> {
    let bytes = fs::read(path).map_err(|e| TrackError::io(path, e))?;
    let corrupt = |reason: String| TrackError::CorruptArtifact {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(corrupt("not a crtc-ml model file (bad magic bytes)".to_string()));
    }

    let envelope: ArtifactEnvelope = envelope_options()
        .with_limit(bytes.len() as u64)
        .deserialize(&bytes)
        .map_err(|e| corrupt(format!("unreadable header: {}", e)))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {} (expected {})",
            envelope.format_version, FORMAT_VERSION
        )));
    }
    if xxh3_64(&envelope.payload) != envelope.checksum {
        return Err(corrupt("checksum verification failed".to_string()));
    }
    Ok(envelope)
}
