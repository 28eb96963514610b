//! Data loading
//!
//! - SVM-light parsing
//! - Class label comparison
//! - Directory loading with sparse-index reconciliation
//! - Track-candidate segmentation of test data

mod dataset;
pub mod labels;
pub mod loader;
pub mod segment;
pub mod svm;

pub use dataset::Dataset;
pub use labels::{distinct_labels, label_index, same_label};
pub use loader::{DatasetLoader, LoaderConfig, DEFAULT_MAX_CELLS};
pub use segment::segment_rows;
pub use svm::{parse_line, SvmRecord};
