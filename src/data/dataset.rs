//! In-memory labelled dataset

use super::labels::{distinct_labels, label_index};
use crate::error::{Result, TrackError};
use ndarray::{s, Array1, Array2};
use std::path::PathBuf;

/// Dense feature matrix plus a parallel label vector.
///
/// Rows are records in load order. Every row has the same width and
/// `labels.len() == features.nrows()`.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array1<f64>,
    sources: Vec<PathBuf>,
}

impl Dataset {
    /// Build a dataset, validating that labels and rows line up
    pub fn new(features: Array2<f64>, labels: Array1<f64>, sources: Vec<PathBuf>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(TrackError::shape(
                format!("{} labels", features.nrows()),
                format!("{} labels", labels.len()),
            ));
        }
        Ok(Self {
            features,
            labels,
            sources,
        })
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    /// Files the records were read from, in load order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    /// Sorted distinct labels
    pub fn class_labels(&self) -> Vec<f64> {
        distinct_labels(self.labels.iter())
    }

    /// True when the labels hold at most two classes, one of them `positive`
    pub fn is_binary(&self, positive: f64) -> bool {
        let classes = self.class_labels();
        classes.len() <= 2 && label_index(&classes, positive).is_some()
    }

    /// Zero-pad the feature matrix to `width` columns.
    ///
    /// A test set may simply never mention the highest feature indices a model
    /// was trained on; those columns are implicitly zero. Narrowing is refused.
    pub fn with_width(self, width: usize) -> Result<Self> {
        let current = self.n_features();
        if width == current {
            return Ok(self);
        }
        if width < current {
            return Err(TrackError::shape(
                format!("at most {} features", width),
                format!("{} features", current),
            ));
        }

        let mut widened = Array2::zeros((self.n_samples(), width));
        widened.slice_mut(s![.., ..current]).assign(&self.features);
        Ok(Self {
            features: widened,
            labels: self.labels,
            sources: self.sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_rejects_label_mismatch() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![1.0];
        let err = Dataset::new(x, y, vec![]).unwrap_err();
        assert!(matches!(err, TrackError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_with_width_pads_zeros() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![1.0, 0.0];
        let ds = Dataset::new(x, y, vec![]).unwrap().with_width(4).unwrap();
        assert_eq!(ds.n_features(), 4);
        assert_eq!(ds.features()[[1, 1]], 4.0);
        assert_eq!(ds.features()[[1, 3]], 0.0);
    }

    #[test]
    fn test_with_width_refuses_narrowing() {
        let x = array![[1.0, 2.0, 3.0]];
        let y = array![1.0];
        let ds = Dataset::new(x, y, vec![]).unwrap();
        assert!(ds.with_width(2).is_err());
    }

    #[test]
    fn test_class_labels_sorted_unique() {
        let x = Array2::zeros((4, 1));
        let y = array![2.0, 0.0, 2.0, 1.0];
        let ds = Dataset::new(x, y, vec![]).unwrap();
        assert_eq!(ds.class_labels(), vec![0.0, 1.0, 2.0]);
        assert!(!ds.is_binary(1.0));
    }

    #[test]
    fn test_is_binary_needs_positive_class() {
        let x = Array2::zeros((3, 1));
        let ds = Dataset::new(x, array![-1.0, 1.0, -1.0], vec![]).unwrap();
        assert!(ds.is_binary(1.0));
        assert!(!ds.is_binary(0.0));

        let x = Array2::zeros((2, 1));
        let ds = Dataset::new(x, array![0.0, 0.0], vec![]).unwrap();
        assert!(!ds.is_binary(1.0));
    }
}
