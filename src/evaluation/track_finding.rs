//! Track-finding accuracy over candidate segments
//!
//! Each segment holds one true track followed by the false candidates that
//! compete with it (see [`crate::data::segment_rows`]).

use crate::data::segment_rows;
use crate::error::{Result, TrackError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Segment-level reconstruction accuracies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackFindingMetrics {
    /// True track has the highest score in its segment
    pub accuracy_a1: f64,
    /// True track is classified as a track
    pub accuracy_ac: f64,
    /// At least one false candidate is classified as a track
    pub accuracy_ah: f64,
    /// True track is rejected
    pub accuracy_af: f64,
    pub n_segments: usize,
}

impl TrackFindingMetrics {
    /// Compute the metrics, or `None` when the labels contain no segment
    pub fn compute(
        scores: &Array1<f64>,
        truth: &Array1<f64>,
        positive: f64,
        threshold: f64,
    ) -> Result<Option<Self>> {
        if scores.len() != truth.len() {
            return Err(TrackError::shape(
                format!("{} scores", truth.len()),
                format!("{} scores", scores.len()),
            ));
        }

        let segments = segment_rows(truth, positive);
        if segments.is_empty() {
            return Ok(None);
        }

        let (mut top, mut accepted, mut hallucinated, mut rejected) = (0usize, 0usize, 0usize, 0usize);
        for seg in &segments {
            let true_score = scores[seg.start];
            let best_rival = (seg.start + 1..seg.end)
                .map(|i| scores[i])
                .fold(f64::NEG_INFINITY, f64::max);

            if true_score >= best_rival {
                top += 1;
            }
            if true_score > threshold {
                accepted += 1;
            } else {
                rejected += 1;
            }
            if best_rival > threshold {
                hallucinated += 1;
            }
        }

        let n = segments.len() as f64;
        Ok(Some(Self {
            accuracy_a1: top as f64 / n,
            accuracy_ac: accepted as f64 / n,
            accuracy_ah: hallucinated as f64 / n,
            accuracy_af: rejected as f64 / n,
            n_segments: segments.len(),
        }))
    }

    /// Metric name/value pairs for an evaluation report
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("accuracy_a1", self.accuracy_a1),
            ("accuracy_ac", self.accuracy_ac),
            ("accuracy_ah", self.accuracy_ah),
            ("accuracy_af", self.accuracy_af),
            ("n_segments", self.n_segments as f64),
        ]
    }
}
