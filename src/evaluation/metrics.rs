//! Classification metrics

use crate::data::{distinct_labels, label_index};
use crate::error::{Result, TrackError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confusion matrix: rows are true classes, columns predicted classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    classes: Vec<f64>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    fn compute(predicted: &Array1<f64>, truth: &Array1<f64>) -> Self {
        let classes = distinct_labels(truth.iter().chain(predicted.iter()));

        let mut counts = vec![vec![0usize; classes.len()]; classes.len()];
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            let (ti, pi) = (class_index(&classes, t), class_index(&classes, p));
            counts[ti][pi] += 1;
        }
        Self { classes, counts }
    }

    /// Class labels, ascending
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Number of rows with true class `actual` predicted as `predicted`
    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual][predicted]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn correct(&self) -> usize {
        (0..self.classes.len()).map(|i| self.counts[i][i]).sum()
    }

    fn column_sum(&self, j: usize) -> usize {
        self.counts.iter().map(|row| row[j]).sum()
    }

    fn row_sum(&self, i: usize) -> usize {
        self.counts[i].iter().sum()
    }
}

fn class_index(classes: &[f64], label: f64) -> usize {
    label_index(classes, label).unwrap_or(0)
}

/// Render a class label as used in metric names: `1`, `-1`, `0.5`
pub fn format_class(label: f64) -> String {
    if label.fract() == 0.0 && label.abs() < 1e15 {
        format!("{}", label as i64)
    } else {
        format!("{}", label)
    }
}

/// Immutable result of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    metrics: BTreeMap<String, f64>,
    confusion: ConfusionMatrix,
}

impl EvaluationReport {
    /// Overall exact-match accuracy
    pub fn accuracy(&self) -> f64 {
        self.metrics.get("accuracy").copied().unwrap_or(0.0)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// All metrics, ordered by name
    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn confusion_matrix(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    /// A new report with additional metrics merged in
    pub fn with_extra<I, K>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.metrics.extend(extra.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }
}

/// Computes reconstruction-quality statistics from predictions and ground truth
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEvaluator;

impl MetricsEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Accuracy, per-class precision/recall, macro F1 and the confusion matrix
    pub fn evaluate(&self, predicted: &Array1<f64>, truth: &Array1<f64>) -> Result<EvaluationReport> {
        if predicted.len() != truth.len() {
            return Err(TrackError::shape(
                format!("{} predictions", truth.len()),
                format!("{} predictions", predicted.len()),
            ));
        }
        if truth.is_empty() {
            return Err(TrackError::shape("at least one sample", "0 samples"));
        }

        let confusion = ConfusionMatrix::compute(predicted, truth);
        let n = confusion.total() as f64;

        let mut metrics = BTreeMap::new();
        metrics.insert("accuracy".to_string(), confusion.correct() as f64 / n);
        metrics.insert("n_samples".to_string(), n);

        let mut f1_sum = 0.0;
        for (i, &class) in confusion.classes().iter().enumerate() {
            let tp = confusion.count(i, i) as f64;
            let predicted_pos = confusion.column_sum(i) as f64;
            let actual_pos = confusion.row_sum(i) as f64;

            let precision = if predicted_pos > 0.0 { tp / predicted_pos } else { 0.0 };
            let recall = if actual_pos > 0.0 { tp / actual_pos } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            f1_sum += f1;

            let name = format_class(class);
            metrics.insert(format!("precision[{}]", name), precision);
            metrics.insert(format!("recall[{}]", name), recall);
        }
        metrics.insert("macro_f1".to_string(), f1_sum / confusion.classes().len() as f64);

        Ok(EvaluationReport { metrics, confusion })
    }
}
