//! Track-candidate segmentation
//!
//! Test files list, for every reconstructed track, the true candidate first
//! followed by the false candidates competing with it. A segment therefore
//! starts at each row labelled with the positive class.

use super::labels::same_label;
use ndarray::Array1;
use std::ops::Range;
use tracing::warn;

/// Row ranges of candidate groups, in row order.
///
/// Rows before the first positive row belong to no segment.
pub fn segment_rows(labels: &Array1<f64>, positive: f64) -> Vec<Range<usize>> {
    let starts: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &label)| same_label(label, positive))
        .map(|(i, _)| i)
        .collect();

    if let Some(&first) = starts.first() {
        if first > 0 {
            warn!(rows = first, "ignoring leading rows with no true track candidate");
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(k, &start)| {
            let end = starts.get(k + 1).copied().unwrap_or(labels.len());
            start..end
        })
        .collect()
}
