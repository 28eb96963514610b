//! Trainable model capability interface

use crate::data::same_label;
use crate::error::{Result, TrackError};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Contract every model backend satisfies.
///
/// Instances are created empty by a registry factory, then either trained or
/// restored with [`TrainableModel::deserialize`].
pub trait TrainableModel: Send + Sync + Debug {
    /// Registry identifier of this backend
    fn model_type(&self) -> &str;

    /// Fit the model to training data
    fn train(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// One predicted label per row, in row order
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Score in [0, 1] that each row belongs to the `positive` class
    fn positive_scores(&self, x: &Array2<f64>, positive: f64) -> Result<Array1<f64>> {
        let preds = self.predict(x)?;
        Ok(preds.mapv(|p| if same_label(p, positive) { 1.0 } else { 0.0 }))
    }

    fn is_trained(&self) -> bool;

    /// Input width the model was trained on
    fn n_features(&self) -> Option<usize>;

    /// Hyperparameters, rendered for artifact metadata
    fn hyperparameters(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Save model to bytes
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Replace this instance's state with a previously serialized model
    fn deserialize(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Common input checks shared by the backends
pub(crate) fn validate_training_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(TrackError::Training("training set has no rows".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(TrackError::Training(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(pos) = y.iter().position(|v| !v.is_finite()) {
        return Err(TrackError::Training(format!("label at row {} is not finite", pos)));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(TrackError::Training("features contain non-finite values".to_string()));
    }
    Ok(())
}

/// Reject prediction inputs whose width differs from the trained width
pub(crate) fn check_width(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(TrackError::ShapeMismatch {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Fraction of predictions matching the labels
pub(crate) fn accuracy(pred: &Array1<f64>, y: &Array1<f64>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let correct = pred.iter().zip(y.iter()).filter(|(p, t)| same_label(**p, **t)).count();
    correct as f64 / y.len() as f64
}
