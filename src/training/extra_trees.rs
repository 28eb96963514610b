//! Extra Trees (Extremely Randomized Trees) classifier
//!
//! Unlike Random Forest which searches for the best split among a random subset
//! of features, Extra Trees picks both the feature AND the threshold at random.
//! This further reduces variance at a small cost to bias, and is faster to train.

use super::config::ExtraTreesConfig;
use super::models::{check_width, validate_training_input, TrainableModel};
use crate::data::{distinct_labels, label_index};
use crate::error::{Result, TrackError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Registry identifier
pub const MODEL_TYPE: &str = "et";

/// An extremely randomized tree node. Leaves hold an index into `classes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ExtraTreeNode {
    Leaf { class: usize },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<ExtraTreeNode>,
        right: Box<ExtraTreeNode>,
    },
}

impl ExtraTreeNode {
    /// Check every split and leaf against the model's feature and class counts
    fn check(&self, n_features: usize, n_classes: usize) -> std::result::Result<(), String> {
        match self {
            ExtraTreeNode::Leaf { class } if *class >= n_classes => Err(format!(
                "leaf class {} out of range for {} classes",
                class, n_classes
            )),
            ExtraTreeNode::Leaf { .. } => Ok(()),
            ExtraTreeNode::Split { feature, .. } if *feature >= n_features => Err(format!(
                "split on feature {} out of range for {} features",
                feature, n_features
            )),
            ExtraTreeNode::Split { left, right, .. } => {
                left.check(n_features, n_classes)?;
                right.check(n_features, n_classes)
            }
        }
    }

    fn predict_sample(&self, sample: &ArrayView1<f64>) -> usize {
        match self {
            ExtraTreeNode::Leaf { class } => *class,
            ExtraTreeNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict_sample(sample)
                } else {
                    right.predict_sample(sample)
                }
            }
        }
    }
}

/// Growth parameters shared by every tree of one fit
struct GrowParams {
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    n_classes: usize,
}

/// Extra Trees ensemble classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTrees {
    config: ExtraTreesConfig,
    trees: Vec<ExtraTreeNode>,
    n_features: usize,
    classes: Vec<f64>,
    is_fitted: bool,
}

impl Default for ExtraTrees {
    fn default() -> Self {
        Self::new(ExtraTreesConfig::default())
    }
}

impl ExtraTrees {
    pub fn new(config: ExtraTreesConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &ExtraTreesConfig {
        &self.config
    }

    /// Reject restored trees that would index past the features or classes
    fn check_structure(&self) -> Result<()> {
        if !self.is_fitted {
            return Ok(());
        }
        if self.classes.is_empty() || self.trees.is_empty() {
            return Err(TrackError::Serialization(
                "fitted model without classes or trees".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features, self.classes.len())
                .map_err(|reason| TrackError::Serialization(format!("tree {}: {}", i, reason)))?;
        }
        Ok(())
    }

    /// Class labels seen during training, ascending
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.config.max_features {
            Some(mf) => mf.min(n_features).max(1),
            None => ((n_features as f64).sqrt().ceil() as usize).max(1),
        }
    }

    /// Build a single extra tree with random splits
    fn build_tree(
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        params: &GrowParams,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> ExtraTreeNode {
        let n = indices.len();

        // Leaf conditions
        if n < params.min_samples_split
            || n <= 1
            || params.max_depth.map_or(false, |d| depth >= d)
        {
            return ExtraTreeNode::Leaf {
                class: Self::majority(y, indices, params.n_classes),
            };
        }

        let first_y = y[indices[0]];
        if indices.iter().all(|&i| y[i] == first_y) {
            return ExtraTreeNode::Leaf { class: first_y };
        }

        let feature_indices = Self::random_features(x.ncols(), params.max_features, rng);

        let mut best: Option<(usize, f64, f64)> = None;

        for &f in &feature_indices {
            let mut fmin = f64::MAX;
            let mut fmax = f64::MIN;
            for &i in indices {
                let v = x[[i, f]];
                if v < fmin { fmin = v; }
                if v > fmax { fmax = v; }
            }

            if (fmax - fmin).abs() < 1e-15 {
                continue; // Feature is constant here
            }

            // Pick a random threshold uniformly between min and max
            let r = (rng.next_u64() as f64) / (u64::MAX as f64);
            let threshold = fmin + r * (fmax - fmin);

            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, f]] <= threshold);

            if left_idx.len() < params.min_samples_leaf || right_idx.len() < params.min_samples_leaf {
                continue;
            }

            let score = Self::gini_split(y, &left_idx, &right_idx, params.n_classes);
            if best.map_or(true, |(_, _, s)| score < s) {
                best = Some((f, threshold, score));
            }
        }

        let (feature, threshold) = match best {
            Some((f, t, _)) => (f, t),
            None => {
                return ExtraTreeNode::Leaf {
                    class: Self::majority(y, indices, params.n_classes),
                }
            }
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

        let left = Self::build_tree(x, y, &left_idx, params, depth + 1, rng);
        let right = Self::build_tree(x, y, &right_idx, params, depth + 1, rng);

        ExtraTreeNode::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn random_features(n_features: usize, max_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..n_features).collect();
        if max_features >= n_features {
            return features;
        }
        // Fisher-Yates partial shuffle
        for i in 0..max_features {
            let j = i + (rng.next_u64() as usize) % (n_features - i);
            features.swap(i, j);
        }
        features.truncate(max_features);
        features
    }

    fn class_counts(y: &[usize], indices: &[usize], n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; n_classes];
        for &i in indices {
            counts[y[i]] += 1;
        }
        counts
    }

    /// Most frequent class; ties go to the smallest class index
    fn majority(y: &[usize], indices: &[usize], n_classes: usize) -> usize {
        argmax(&Self::class_counts(y, indices, n_classes))
    }

    fn gini_split(y: &[usize], left: &[usize], right: &[usize], n_classes: usize) -> f64 {
        let n = (left.len() + right.len()) as f64;
        let lg = Self::gini_impurity(y, left, n_classes);
        let rg = Self::gini_impurity(y, right, n_classes);
        (left.len() as f64 * lg + right.len() as f64 * rg) / n
    }

    fn gini_impurity(y: &[usize], indices: &[usize], n_classes: usize) -> f64 {
        let n = indices.len() as f64;
        if n == 0.0 { return 0.0; }
        let counts = Self::class_counts(y, indices, n_classes);
        1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
    }

    /// Per-row vote counts, one column per class
    fn votes(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrackError::NotTrained);
        }
        check_width(self.n_features, x)?;

        let mut votes = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, sample) in x.rows().into_iter().enumerate() {
            for tree in &self.trees {
                votes[[i, tree.predict_sample(&sample)]] += 1.0;
            }
        }
        Ok(votes)
    }

    /// Vote fractions per class, rows sum to 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let votes = self.votes(x)?;
        let n_trees = self.trees.len().max(1) as f64;
        Ok(votes / n_trees)
    }
}

fn argmax(values: &[usize]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

impl TrainableModel for ExtraTrees {
    fn model_type(&self) -> &str {
        MODEL_TYPE
    }

    fn train(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_input(x, y)?;

        let n_features = x.ncols();
        let classes = distinct_labels(y.iter());
        let encoded: Vec<usize> = y
            .iter()
            .map(|&v| label_index(&classes, v).unwrap_or(0))
            .collect();

        let params = GrowParams {
            max_features: self.compute_max_features(n_features),
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf.max(1),
            n_classes: classes.len(),
        };
        let base_seed = self.config.random_state;
        let all_indices: Vec<usize> = (0..x.nrows()).collect();

        debug!(
            trees = self.config.n_estimators,
            max_features = params.max_features,
            classes = classes.len(),
            "growing extra trees"
        );

        // Extra Trees does NOT bootstrap, each tree sees the full dataset
        let trees: Vec<ExtraTreeNode> = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                Self::build_tree(x, &encoded, &all_indices, &params, 0, &mut rng)
            })
            .collect();

        self.trees = trees;
        self.classes = classes;
        self.n_features = n_features;
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let votes = self.votes(x)?;
        Ok(votes
            .rows()
            .into_iter()
            .map(|row| {
                let counts: Vec<usize> = row.iter().map(|&v| v as usize).collect();
                self.classes[argmax(&counts)]
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
        params.insert("n_estimators".to_string(), self.config.n_estimators.to_string());
        params.insert(
            "max_depth".to_string(),
            self.config.max_depth.map_or("none".to_string(), |d| d.to_string()),
        );
        params.insert("min_samples_split".to_string(), self.config.min_samples_split.to_string());
        params.insert("min_samples_leaf".to_string(), self.config.min_samples_leaf.to_string());
        params.insert(
            "max_features".to_string(),
            self.config.max_features.map_or("sqrt".to_string(), |m| m.to_string()),
        );
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
        let restored: ExtraTrees = bincode::deserialize(bytes)?;
        restored.check_structure()?;
        *self = restored;
        Ok(())
    }
}
