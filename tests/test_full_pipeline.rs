//! End-to-end tests: SVM directories → training → evaluation → artifact

use crtc_ml::evaluation::MetricsEvaluator;
use crtc_ml::pipeline::{Pipeline, PipelineConfig, PipelineState, TrainRequest};
use crtc_ml::training::{BackendConfig, ExtraTreesConfig, ModelRegistry, TrainableModel};
use crtc_ml::{Result, TrackError};
use ndarray::{Array1, Array2};
use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn registry() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::builtin(&BackendConfig {
        extra_trees: ExtraTreesConfig::default().with_n_estimators(20),
        ..BackendConfig::default()
    }))
}

/// Write `n_rows` records with `n_features` features. Every `group`-th row is
/// a true track (label 1) followed by false candidates (label 0).
fn write_svm(dir: &Path, name: &str, n_rows: usize, n_features: usize, group: usize, seed: u64) {
    fs::create_dir_all(dir).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut text = String::new();
    for i in 0..n_rows {
        let label = if i % group == 0 { 1 } else { 0 };
        text.push_str(&label.to_string());
        for j in 1..=n_features {
            let value = label as f64 * 2.0 + rng.gen::<f64>();
            text.push_str(&format!(" {}:{:.4}", j, value));
        }
        text.push('\n');
    }
    fs::write(dir.join(name), text).unwrap();
}

struct Workspace {
    _root: tempfile::TempDir,
    train: PathBuf,
    test: PathBuf,
    out: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let train = root.path().join("train");
        let test = root.path().join("test");
        let out = root.path().join("models").join("model.bin");
        fs::create_dir_all(&train).unwrap();
        fs::create_dir_all(&test).unwrap();
        Self { _root: root, train, test, out }
    }

    fn request(&self, model_type: &str) -> TrainRequest {
        TrainRequest::new(model_type, &self.train, &self.test, &self.out)
    }

    fn no_artifact(&self) -> bool {
        !self.out.exists() && !self.out.parent().map_or(false, |p| p.exists())
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_extra_trees_end_to_end() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train-0.txt", 50, 10, 2, 1);
    write_svm(&ws.train, "train-1.txt", 50, 10, 2, 2);
    write_svm(&ws.test, "test-0.txt", 20, 10, 4, 3);

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    let outcome = pipeline.run(&ws.request("et")).unwrap();

    assert!(ws.out.exists());
    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(outcome.training.n_samples, 100);
    assert_eq!(outcome.training.n_features, 10);

    let accuracy = outcome.evaluation.accuracy();
    assert!((0.0..=1.0).contains(&accuracy));
    assert_eq!(outcome.evaluation.get("n_samples"), Some(20.0));
    assert_eq!(outcome.evaluation.get("n_segments"), Some(5.0));
    assert_eq!(outcome.metadata.training_files.len(), 2);
    assert_eq!(outcome.metadata.metrics.get("test_accuracy"), Some(&accuracy));
}

#[test]
fn test_saved_model_evaluates_identically() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 60, 6, 3, 4);
    write_svm(&ws.test, "test.txt", 30, 6, 3, 5);

    let registry = registry();
    let mut pipeline = Pipeline::new(Arc::clone(&registry), PipelineConfig::default());
    let trained = pipeline.run(&ws.request("et")).unwrap();

    let mut tester = Pipeline::new(registry, PipelineConfig::default());
    let tested = tester.evaluate_artifact(&ws.out, &ws.test).unwrap();

    assert_eq!(tested.metadata.model_type, "et");
    assert_eq!(tested.n_samples, 30);
    assert_eq!(tested.evaluation.metrics(), trained.evaluation.metrics());
    assert_eq!(
        tester.history(),
        &[
            PipelineState::Idle,
            PipelineState::Loading,
            PipelineState::Evaluating,
            PipelineState::Done,
        ]
    );
}

#[test]
fn test_narrow_test_set_is_padded() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 40, 8, 2, 6);
    write_svm(&ws.test, "test.txt", 10, 5, 2, 7);

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    let outcome = pipeline.run(&ws.request("et")).unwrap();
    assert_eq!(outcome.evaluation.get("n_samples"), Some(10.0));
}

#[test]
fn test_unknown_model_type_writes_nothing() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 20, 4, 2, 8);
    write_svm(&ws.test, "test.txt", 10, 4, 2, 9);

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    let err = pipeline.run(&ws.request("nonexistent")).unwrap_err();

    assert!(matches!(err.error(), TrackError::UnknownModelType { name, .. } if name == "nonexistent"));
    assert!(err.to_string().contains("loading"));
    assert!(ws.no_artifact());
}

#[test]
fn test_empty_testing_dir_writes_nothing() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 20, 4, 2, 10);

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    let err = pipeline.run(&ws.request("et")).unwrap_err();

    assert_eq!(err.stage, PipelineState::Loading);
    assert!(matches!(err.error(), TrackError::EmptyDataset { .. }));
    assert!(ws.no_artifact());
}

#[test]
fn test_malformed_testing_data_writes_nothing() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 20, 4, 2, 11);
    fs::write(ws.test.join("test.txt"), "1 1:0.5 2:x\n").unwrap();

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    let err = pipeline.run(&ws.request("et")).unwrap_err();

    assert!(matches!(err.error(), TrackError::DataFormat { line: 1, .. }));
    assert!(ws.no_artifact());
}

#[test]
fn test_wider_test_set_fails_evaluation() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 20, 4, 2, 12);
    write_svm(&ws.test, "test.txt", 10, 6, 2, 13);

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    let err = pipeline.run(&ws.request("et")).unwrap_err();

    assert_eq!(err.stage, PipelineState::Evaluating);
    assert!(matches!(err.error(), TrackError::ShapeMismatch { .. }));
    assert!(ws.no_artifact());
    assert_eq!(pipeline.history().last(), Some(&PipelineState::Failed));
}

#[test]
fn test_single_class_training_fails_in_training() {
    let ws = Workspace::new();
    fs::write(ws.train.join("train.txt"), "0 1:1.0\n0 1:2.0\n").unwrap();
    write_svm(&ws.test, "test.txt", 4, 1, 2, 14);

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    let err = pipeline.run(&ws.request("mlp")).unwrap_err();

    assert_eq!(err.stage, PipelineState::Training);
    assert!(matches!(err.error(), TrackError::Training(_)));
    assert!(ws.no_artifact());
}

#[test]
fn test_failed_run_keeps_existing_artifact() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 20, 4, 2, 15);
    fs::create_dir_all(ws.out.parent().unwrap()).unwrap();
    fs::write(&ws.out, b"previous model").unwrap();

    let mut pipeline = Pipeline::new(registry(), PipelineConfig::default());
    assert!(pipeline.run(&ws.request("et")).is_err());
    assert_eq!(fs::read(&ws.out).unwrap(), b"previous model");
}

// ============================================================================
// Custom backends
// ============================================================================

/// Labels a row positive when its first feature exceeds the training mean
#[derive(Debug, Default, Serialize, Deserialize)]
struct MeanCut {
    cut: f64,
    n_features: Option<usize>,
}

impl TrainableModel for MeanCut {
    fn model_type(&self) -> &str {
        "mean-cut"
    }

    fn train(&mut self, x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        self.cut = x.column(0).mean().unwrap_or(0.0);
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let width = self.n_features.ok_or(TrackError::NotTrained)?;
        if x.ncols() != width {
            return Err(TrackError::ShapeMismatch {
                expected: width.to_string(),
                actual: x.ncols().to_string(),
            });
        }
        Ok(x.column(0).mapv(|v| if v > self.cut { 1.0 } else { 0.0 }))
    }

    fn is_trained(&self) -> bool {
        self.n_features.is_some()
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        *self = serde_json::from_slice(bytes)?;
        Ok(())
    }
}

#[test]
fn test_registered_backend_runs_without_pipeline_changes() {
    let ws = Workspace::new();
    write_svm(&ws.train, "train.txt", 40, 3, 2, 16);
    write_svm(&ws.test, "test.txt", 12, 3, 3, 17);

    let mut registry = ModelRegistry::builtin(&BackendConfig::default());
    registry.register("mean-cut", || Box::new(MeanCut::default()) as Box<dyn TrainableModel>);
    let registry = Arc::new(registry);

    let mut pipeline = Pipeline::new(Arc::clone(&registry), PipelineConfig::default());
    let outcome = pipeline.run(&ws.request("mean-cut")).unwrap();
    assert_eq!(outcome.evaluation.accuracy(), 1.0);
    assert_eq!(outcome.evaluation.get("accuracy_a1"), Some(1.0));

    let mut tester = Pipeline::new(registry, PipelineConfig::default());
    let tested = tester.evaluate_artifact(&ws.out, &ws.test).unwrap();
    assert_eq!(tested.metadata.model_type, "mean-cut");
    assert_eq!(tested.evaluation.accuracy(), 1.0);
}

// ============================================================================
// Metrics laws
// ============================================================================

#[test]
fn test_independent_permutation_changes_accuracy() {
    let truth = Array1::from(vec![1.0, 0.0, 0.0, 1.0]);
    let predicted = truth.clone();
    let shuffled = Array1::from(vec![0.0, 1.0, 0.0, 1.0]);

    let evaluator = MetricsEvaluator::new();
    let aligned = evaluator.evaluate(&predicted, &truth).unwrap();
    let broken = evaluator.evaluate(&shuffled, &truth).unwrap();

    assert_eq!(aligned.accuracy(), 1.0);
    assert_eq!(broken.accuracy(), 0.5);
}

proptest! {
    #[test]
    fn prop_joint_permutation_is_invariant(
        pairs in prop::collection::vec((0u8..3, 0u8..3), 1..40),
        seed in any::<u64>(),
    ) {
        let predicted: Array1<f64> = pairs.iter().map(|&(p, _)| p as f64).collect();
        let truth: Array1<f64> = pairs.iter().map(|&(_, t)| t as f64).collect();

        let mut order: Vec<usize> = (0..pairs.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        let predicted_perm: Array1<f64> = order.iter().map(|&i| predicted[i]).collect();
        let truth_perm: Array1<f64> = order.iter().map(|&i| truth[i]).collect();

        let evaluator = MetricsEvaluator::new();
        let original = evaluator.evaluate(&predicted, &truth).unwrap();
        let permuted = evaluator.evaluate(&predicted_perm, &truth_perm).unwrap();

        prop_assert_eq!(original.metrics(), permuted.metrics());
        prop_assert_eq!(original.confusion_matrix(), permuted.confusion_matrix());
    }

    #[test]
    fn prop_accuracy_is_a_fraction(
        pairs in prop::collection::vec((0u8..2, 0u8..2), 1..40),
    ) {
        let predicted: Array1<f64> = pairs.iter().map(|&(p, _)| p as f64).collect();
        let truth: Array1<f64> = pairs.iter().map(|&(_, t)| t as f64).collect();
        let report = MetricsEvaluator::new().evaluate(&predicted, &truth).unwrap();
        prop_assert!((0.0..=1.0).contains(&report.accuracy()));
    }
}
