//! Training pipeline orchestration
//!
//! A [`Pipeline`] drives one run through
//! `Idle → Loading → Training → Evaluating → Persisting → Done`. Any
//! collaborator error moves it to `Failed` and surfaces as a [`StageError`]
//! naming the stage. Nothing is written to disk before evaluation succeeds.

mod config;
mod state;

pub use config::PipelineConfig;
pub use state::{PipelineState, StageError};

use crate::data::{Dataset, DatasetLoader};
use crate::error::{Result, TrackError};
use crate::evaluation::{EvaluationReport, MetricsEvaluator, TrackFindingMetrics};
use crate::export::{ArtifactStore, ModelMetadata, TrainedModel};
use crate::training::{accuracy, ModelRegistry, TrainableModel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Inputs of a training run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainRequest {
    pub model_type: String,
    pub training_dir: PathBuf,
    pub testing_dir: PathBuf,
    pub output_path: PathBuf,
}

impl TrainRequest {
    pub fn new(
        model_type: impl Into<String>,
        training_dir: impl Into<PathBuf>,
        testing_dir: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_type: model_type.into(),
            training_dir: training_dir.into(),
            testing_dir: testing_dir.into(),
            output_path: output_path.into(),
        }
    }
}

/// Training-side figures of a run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub n_samples: usize,
    pub n_features: usize,
    /// Accuracy of the model on its own training data
    pub accuracy: f64,
    pub duration: Duration,
}

/// Result of a successful [`Pipeline::run`]
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model_type: String,
    pub artifact_path: PathBuf,
    pub training: TrainingSummary,
    pub evaluation: EvaluationReport,
    pub prediction_time: Duration,
    pub metadata: ModelMetadata,
}

/// Result of a successful [`Pipeline::evaluate_artifact`]
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    /// Header of the evaluated artifact
    pub metadata: ModelMetadata,
    pub n_samples: usize,
    pub evaluation: EvaluationReport,
    pub prediction_time: Duration,
}

/// One-shot training/evaluation pipeline
#[derive(Debug)]
pub struct Pipeline {
    registry: Arc<ModelRegistry>,
    config: PipelineConfig,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Pipeline {
    pub fn new(registry: Arc<ModelRegistry>, config: PipelineConfig) -> Self {
        Self {
            registry,
            config,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Train `request.model_type` on the training directory, evaluate it on
    /// the testing directory and persist it to `request.output_path`.
    pub fn run(&mut self, request: &TrainRequest) -> std::result::Result<TrainOutcome, StageError> {
        self.ensure_idle()?;
        info!(
            model_type = %request.model_type,
            training_dir = %request.training_dir.display(),
            testing_dir = %request.testing_dir.display(),
            "starting training run"
        );

        self.advance(PipelineState::Loading);
        let loader = DatasetLoader::new(self.config.loader.clone());
        let train = self.stage(loader.load(&request.training_dir))?;
        let test = self.stage(loader.load(&request.testing_dir))?;
        let mut model = self.stage(self.registry.resolve(&request.model_type))?;

        self.advance(PipelineState::Training);
        let training = self.stage(train_model(model.as_mut(), &train))?;
        info!(
            model_type = %request.model_type,
            accuracy = training.accuracy,
            seconds = training.duration.as_secs_f64(),
            "training finished"
        );

        self.advance(PipelineState::Evaluating);
        let (evaluation, prediction_time) = self.stage(self.evaluate_model(model.as_ref(), test))?;

        self.advance(PipelineState::Persisting);
        let mut metadata = ModelMetadata::new(request.model_type.clone())
            .with_training_source(&request.training_dir, train.sources())
            .with_shape(train.n_samples(), train.n_features(), train.class_labels())
            .with_hyperparameters(model.hyperparameters())
            .add_metric("train_accuracy", training.accuracy)
            .add_metric("training_time_secs", training.duration.as_secs_f64());
        for (name, value) in evaluation.metrics() {
            metadata = metadata.add_metric(format!("test_{}", name), *value);
        }

        let artifact = self.stage(TrainedModel::new(model, metadata.clone()))?;
        let store = ArtifactStore::new(Arc::clone(&self.registry));
        self.stage(store.save(&artifact, &request.output_path))?;

        self.advance(PipelineState::Done);
        Ok(TrainOutcome {
            model_type: request.model_type.clone(),
            artifact_path: request.output_path.clone(),
            training,
            evaluation,
            prediction_time,
            metadata,
        })
    }

    /// Evaluate a saved artifact on a testing directory without writing anything
    pub fn evaluate_artifact(
        &mut self,
        model_path: impl AsRef<Path>,
        testing_dir: impl AsRef<Path>,
    ) -> std::result::Result<EvaluationOutcome, StageError> {
        self.ensure_idle()?;
        let model_path = model_path.as_ref();

        self.advance(PipelineState::Loading);
        let store = ArtifactStore::new(Arc::clone(&self.registry));
        let artifact = self.stage(store.load(model_path))?;
        let test = self.stage(DatasetLoader::new(self.config.loader.clone()).load(testing_dir))?;
        let n_samples = test.n_samples();

        self.advance(PipelineState::Evaluating);
        let (model, metadata) = artifact.into_parts();
        let (evaluation, prediction_time) = self.stage(self.evaluate_model(model.as_ref(), test))?;

        self.advance(PipelineState::Done);
        Ok(EvaluationOutcome {
            metadata,
            n_samples,
            evaluation,
            prediction_time,
        })
    }

    fn evaluate_model(
        &self,
        model: &dyn TrainableModel,
        test: Dataset,
    ) -> Result<(EvaluationReport, Duration)> {
        let width = model.n_features().ok_or(TrackError::NotTrained)?;
        let test = test.with_width(width)?;

        let start = Instant::now();
        let predicted = model.predict(test.features())?;
        let prediction_time = start.elapsed();

        let mut report = MetricsEvaluator::new().evaluate(&predicted, test.labels())?;

        let positive = self.config.positive_label;
        if test.is_binary(positive) {
            let scores = model.positive_scores(test.features(), positive)?;
            match TrackFindingMetrics::compute(
                &scores,
                test.labels(),
                positive,
                self.config.decision_threshold,
            )? {
                Some(tracks) => report = report.with_extra(tracks.entries()),
                None => warn!("testing data holds no track segments"),
            }
        } else {
            debug!(n_classes = test.class_labels().len(), "skipping track-finding metrics");
        }

        info!(
            n_samples = test.n_samples(),
            accuracy = report.accuracy(),
            seconds = prediction_time.as_secs_f64(),
            "evaluation finished"
        );
        Ok((report, prediction_time))
    }

    fn ensure_idle(&self) -> std::result::Result<(), StageError> {
        if self.state == PipelineState::Idle {
            return Ok(());
        }
        Err(StageError {
            stage: self.state,
            source: TrackError::Config(format!(
                "pipeline already used (state: {}); create a new one per run",
                self.state
            )),
        })
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(self.state.can_transition_to(next), "{} -> {}", self.state, next);
        info!(from = %self.state, to = %next, "pipeline stage");
        self.state = next;
        self.history.push(next);
    }

    /// Tag a collaborator error with the current stage and fail the pipeline
    fn stage<T>(&mut self, result: Result<T>) -> std::result::Result<T, StageError> {
        result.map_err(|source| {
            let stage = self.state;
            warn!(stage = %stage, error = %source, "pipeline failed");
            self.state = PipelineState::Failed;
            self.history.push(PipelineState::Failed);
            StageError { stage, source }
        })
    }
}

fn train_model(model: &mut dyn TrainableModel, train: &Dataset) -> Result<TrainingSummary> {
    let start = Instant::now();
    model.train(train.features(), train.labels())?;
    let duration = start.elapsed();

    let predicted = model.predict(train.features())?;
    Ok(TrainingSummary {
        n_samples: train.n_samples(),
        n_features: train.n_features(),
        accuracy: accuracy(&predicted, train.labels()),
        duration,
    })
}
