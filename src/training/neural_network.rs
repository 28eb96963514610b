//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! A feedforward network with ReLU hidden layers, a softmax output layer and
//! mini-batch gradient descent with momentum.

use super::models::{accuracy, check_width, validate_training_input, TrainableModel};
use crate::data::{distinct_labels, label_index};
use crate::error::{Result, TrackError};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Registry identifier
pub const MODEL_TYPE: &str = "mlp";

/// Activation function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    ReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of epochs
    pub max_epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    /// Random seed
    pub random_state: u64,
    /// Momentum
    pub momentum: f64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 64, 64],
            activation: Activation::ReLU,
            learning_rate: 0.001,
            max_epochs: 40,
            batch_size: 32,
            alpha: 0.0001,
            random_state: 42,
            momentum: 0.9,
        }
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    classes: Vec<f64>,
    is_fitted: bool,
}

impl Default for MLPClassifier {
    fn default() -> Self {
        Self::new(MLPConfig::default())
    }
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    /// Predict class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrackError::NotTrained);
        }
        check_width(self.n_features, x)?;
        let (mut activations, _) = self.forward(x);
        activations
            .pop()
            .ok_or_else(|| TrackError::Training("network has no layers".to_string()))
    }

    /// Units per layer: inputs, hidden layers, one output per class
    fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.n_features];
        sizes.extend(&self.config.hidden_layers);
        sizes.push(self.classes.len());
        sizes
    }

    /// Check that restored parameters chain from the inputs to the classes
    fn check_structure(&self) -> Result<()> {
        if !self.is_fitted {
            return Ok(());
        }
        let invalid = |reason: String| Err(TrackError::Serialization(reason));
        if self.classes.len() < 2 {
            return invalid(format!("fitted network with {} classes", self.classes.len()));
        }
        if self.n_features == 0 {
            return invalid("fitted network without input features".to_string());
        }

        let sizes = self.layer_sizes();
        let n_layers = sizes.len() - 1;
        if self.weights.len() != n_layers || self.biases.len() != n_layers {
            return invalid(format!(
                "expected {} layers, found {} weight and {} bias arrays",
                n_layers,
                self.weights.len(),
                self.biases.len()
            ));
        }
        for (layer, (pair, (w, b))) in sizes
            .windows(2)
            .zip(self.weights.iter().zip(&self.biases))
            .enumerate()
        {
            if w.dim() != (pair[0], pair[1]) || b.len() != pair[1] {
                return invalid(format!(
                    "layer {} has weights {:?} and bias {}, expected ({}, {}) and {}",
                    layer,
                    w.dim(),
                    b.len(),
                    pair[0],
                    pair[1],
                    pair[1]
                ));
            }
        }
        Ok(())
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) -> Result<()> {
        self.weights.clear();
        self.biases.clear();

        let layer_sizes = self.layer_sizes();
        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);

            // Xavier/Glorot initialization
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();
            let weights: Vec<f64> = (0..n_in * n_out)
                .map(|_| rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights.push(Array2::from_shape_vec((n_in, n_out), weights)?);
            self.biases.push(Array1::zeros(n_out));
        }
        Ok(())
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::new();
        let last = self.weights.len().saturating_sub(1);

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[activations.len() - 1].dot(w) + b;
            let a = if i < last {
                activate(&z, self.config.activation)
            } else {
                softmax(&z)
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y_onehot: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y_onehot.nrows() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // Cross-entropy gradient with softmax
        let mut delta = (&activations[activations.len() - 1] - y_onehot) / n;

        for i in (0..self.weights.len()).rev() {
            let a_prev = &activations[i];
            gradients.push((a_prev.t().dot(&delta), delta.sum_axis(Axis(0))));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t())
                    * activate_derivative(&z_values[i - 1], self.config.activation);
            }
        }

        gradients.reverse();
        gradients
    }

    fn to_onehot(&self, y: &Array1<f64>) -> Array2<f64> {
        let mut onehot = Array2::zeros((y.len(), self.classes.len()));
        for (i, label) in y.iter().enumerate() {
            if let Some(idx) = label_index(&self.classes, *label) {
                onehot[[i, idx]] = 1.0;
            }
        }
        onehot
    }
}

fn activate(z: &Array2<f64>, activation: Activation) -> Array2<f64> {
    match activation {
        Activation::ReLU => z.mapv(|v| v.max(0.0)),
        Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
        Activation::Tanh => z.mapv(f64::tanh),
    }
}

fn activate_derivative(z: &Array2<f64>, activation: Activation) -> Array2<f64> {
    match activation {
        Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
        Activation::Sigmoid => {
            let sig = activate(z, Activation::Sigmoid);
            &sig * &(1.0 - &sig)
        }
        Activation::Tanh => {
            let t = z.mapv(f64::tanh);
            1.0 - &t * &t
        }
    }
}

fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        row.mapv_inplace(|v| (v - max).exp() / exp_sum);
    }
    result
}

fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

impl TrainableModel for MLPClassifier {
    fn model_type(&self) -> &str {
        MODEL_TYPE
    }

    fn train(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_input(x, y)?;

        let classes = distinct_labels(y.iter());
        if classes.len() < 2 {
            return Err(TrackError::Training(format!(
                "MLP needs at least two classes, found {}",
                classes.len()
            )));
        }

        self.n_features = x.ncols();
        self.classes = classes;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.initialize_weights(&mut rng)?;

        let y_onehot = self.to_onehot(y);
        let n_samples = x.nrows();
        let batch_size = self.config.batch_size.max(1);

        let mut velocities_w: Vec<Array2<f64>> = self.weights.iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut velocities_b: Vec<Array1<f64>> = self.biases.iter()
            .map(|b| Array1::zeros(b.len()))
            .collect();

        let mut indices: Vec<usize> = (0..n_samples).collect();
        for epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);

            for batch in indices.chunks(batch_size) {
                let x_batch = gather_rows(x, batch);
                let y_batch = gather_rows(&y_onehot, batch);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * self.config.momentum
                        - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum
                        - &grad_b * self.config.learning_rate;

                    self.weights[i] = &self.weights[i] + &velocities_w[i];
                    self.biases[i] = &self.biases[i] + &velocities_b[i];

                    // L2 regularization
                    self.weights[i] *= 1.0 - self.config.alpha * self.config.learning_rate;
                }
            }

            if tracing::enabled!(tracing::Level::DEBUG) {
                self.is_fitted = true;
                let acc = self.predict(x).map(|p| accuracy(&p, y)).unwrap_or(0.0);
                debug!(epoch = epoch + 1, accuracy = acc, "mlp epoch finished");
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (j, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = j;
                    }
                }
                self.classes[best]
            })
            .collect())
    }

    fn positive_scores(&self, x: &Array2<f64>, positive: f64) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(match label_index(&self.classes, positive) {
            Some(idx) => proba.column(idx).to_owned(),
            None => Array1::zeros(x.nrows()),
        })
    }

    fn is_trained(&self) -> bool {
        self.is_fitted
    }

    fn n_features(&self) -> Option<usize> {
        self.is_fitted.then_some(self.n_features)
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        let layers: Vec<String> = self.config.hidden_layers.iter().map(|l| l.to_string()).collect();
        params.insert("hidden_layers".to_string(), layers.join(","));
        params.insert("activation".to_string(), format!("{:?}", self.config.activation));
        params.insert("learning_rate".to_string(), self.config.learning_rate.to_string());
        params.insert("max_epochs".to_string(), self.config.max_epochs.to_string());
        params.insert("batch_size".to_string(), self.config.batch_size.to_string());
        params.insert("alpha".to_string(), self.config.alpha.to_string());
        params.insert("momentum".to_string(), self.config.momentum.to_string());
        params.insert("random_state".to_string(), self.config.random_state.to_string());
        params
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        if !self.is_fitted {
            return Err(TrackError::NotTrained);
        }
        Ok(bincode::serialize(self)?)
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        let restored: MLPClassifier = bincode::deserialize(bytes)?;
        restored.check_structure()?;
        *self = restored;
        Ok(())
    }
}
