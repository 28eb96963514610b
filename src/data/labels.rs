//! Class label comparison
//!
//! Labels are parsed from text as `f64`. Every component that groups,
//! matches or counts labels goes through these helpers so that training,
//! segmentation and metrics agree on what "the same class" means.

/// Labels closer than this are the same class
pub const LABEL_TOLERANCE: f64 = 1e-9;

pub fn same_label(a: f64, b: f64) -> bool {
    (a - b).abs() < LABEL_TOLERANCE
}

/// Sorted distinct labels; labels within tolerance collapse onto the smallest
pub fn distinct_labels<'a>(labels: impl IntoIterator<Item = &'a f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = labels.into_iter().copied().collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup_by(|later, kept| same_label(*later, *kept));
    classes
}

/// Position of `label` in `classes`
pub fn label_index(classes: &[f64], label: f64) -> Option<usize> {
    classes.iter().position(|&c| same_label(c, label))
}
