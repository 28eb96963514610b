//! Model evaluation
//!
//! - `metrics`: accuracy, per-class precision/recall, confusion matrix
//! - `track_finding`: segment-level track reconstruction accuracies

pub mod metrics;
pub mod track_finding;

pub use metrics::{format_class, ConfusionMatrix, EvaluationReport, MetricsEvaluator};
pub use track_finding::TrackFindingMetrics;
