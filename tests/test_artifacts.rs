//! Integration tests for model artifacts

use crtc_ml::export::{ArtifactStore, ModelMetadata, TrainedModel};
use crtc_ml::training::{BackendConfig, ExtraTreesConfig, MLPConfig, ModelRegistry, TrainableModel};
use crtc_ml::TrackError;
use ndarray::{array, Array1, Array2};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn registry() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::builtin(&BackendConfig {
        extra_trees: ExtraTreesConfig::default().with_n_estimators(8),
        mlp: MLPConfig {
            hidden_layers: vec![4],
            max_epochs: 5,
            ..MLPConfig::default()
        },
    }))
}

fn data() -> (Array2<f64>, Array1<f64>) {
    let x = array![
        [0.1, 0.2, 0.0],
        [0.3, 0.1, 0.0],
        [0.2, 0.0, 0.1],
        [4.0, 4.2, 3.9],
        [4.1, 3.8, 4.0],
        [3.9, 4.0, 4.1],
    ];
    let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    (x, y)
}

fn trained(registry: &ModelRegistry, model_type: &str) -> TrainedModel {
    let (x, y) = data();
    let mut model = registry.resolve(model_type).unwrap();
    model.train(&x, &y).unwrap();
    let metadata = ModelMetadata::new(model_type)
        .with_training_source(&PathBuf::from("/data/train"), &[PathBuf::from("/data/train/a.txt")])
        .with_shape(6, 3, vec![0.0, 1.0])
        .with_hyperparameters(model.hyperparameters())
        .add_metric("test_accuracy", 1.0);
    TrainedModel::new(model, metadata).unwrap()
}

// ============================================================================
// Save / load
// ============================================================================

#[test]
fn test_save_load_every_backend() {
    let registry = registry();
    let store = ArtifactStore::new(Arc::clone(&registry));
    let dir = tempfile::tempdir().unwrap();
    let (x, _) = data();

    for name in registry.names() {
        let model = trained(&registry, &name);
        let path = dir.path().join(format!("model.{}", name));
        store.save(&model, &path).unwrap();

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.model_type(), name);
        assert_eq!(loaded.metadata(), model.metadata());
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}

#[test]
fn test_header_is_readable_alone() {
    let registry = registry();
    let store = ArtifactStore::new(Arc::clone(&registry));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.et");
    store.save(&trained(&registry, "et"), &path).unwrap();

    let header = store.read_header(&path).unwrap();
    assert_eq!(header.model_type, "et");
    assert_eq!(header.training_dir, "/data/train");
    assert_eq!(header.training_files, vec!["/data/train/a.txt".to_string()]);
    assert_eq!(header.metrics.get("test_accuracy"), Some(&1.0));
    assert_eq!(header.hyperparameters.get("n_estimators").map(String::as_str), Some("8"));
}

#[test]
fn test_save_creates_parent_directories() {
    let registry = registry();
    let store = ArtifactStore::new(Arc::clone(&registry));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("model.bin");

    store.save(&trained(&registry, "et"), &path).unwrap();
    assert!(path.exists());
    assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
}

// ============================================================================
// Corruption
// ============================================================================

#[test]
fn test_not_an_artifact() {
    let store = ArtifactStore::new(registry());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.bin");
    fs::write(&path, b"1 1:0.5 2:0.25\n").unwrap();

    assert!(matches!(store.load(&path), Err(TrackError::CorruptArtifact { .. })));
}

#[test]
fn test_truncated_artifact() {
    let registry = registry();
    let store = ArtifactStore::new(Arc::clone(&registry));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.et");
    store.save(&trained(&registry, "et"), &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(matches!(store.load(&path), Err(TrackError::CorruptArtifact { .. })));
}

#[test]
fn test_unregistered_model_type() {
    let full = registry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.mlp");
    ArtifactStore::new(Arc::clone(&full))
        .save(&trained(&full, "mlp"), &path)
        .unwrap();

    let mut only_et = ModelRegistry::new();
    only_et.register("et", || {
        Box::new(crtc_ml::training::ExtraTrees::default()) as Box<dyn TrainableModel>
    });
    let store = ArtifactStore::new(Arc::new(only_et));

    match store.load(&path) {
        Err(TrackError::CorruptArtifact { reason, .. }) => assert!(reason.contains("mlp")),
        other => panic!("expected CorruptArtifact, got {:?}", other.map(|m| m.model_type().to_string())),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let store = ArtifactStore::new(registry());
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        store.load(dir.path().join("absent.bin")),
        Err(TrackError::Io { .. })
    ));
}
