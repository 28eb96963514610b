//! SVM-light line parser
//!
//! Each record is `<label> [qid:<n>] <index>:<value> ...` with 1-based,
//! strictly ascending indices. Blank lines and `#` comments are skipped.

use crate::error::{Result, TrackError};
use std::io::BufRead;
use std::path::Path;

/// One sparse labelled record
#[derive(Debug, Clone, PartialEq)]
pub struct SvmRecord {
    pub label: f64,
    /// `(zero-based column, value)` pairs, ascending by column
    pub entries: Vec<(usize, f64)>,
}

impl SvmRecord {
    /// Highest 1-based feature index mentioned, 0 for a record with no features
    pub fn max_index(&self) -> usize {
        self.entries.last().map(|&(col, _)| col + 1).unwrap_or(0)
    }
}

/// Parse a single line.
///
/// Returns `Ok(None)` for lines carrying no record and `Err(reason)` for
/// malformed ones; callers attach the file and line number.
pub fn parse_line(line: &str) -> std::result::Result<Option<SvmRecord>, String> {
    let content = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let mut tokens = content.split_whitespace();

    let label_token = match tokens.next() {
        Some(t) => t,
        None => return Ok(None),
    };
    let label: f64 = label_token
        .parse()
        .map_err(|_| format!("invalid label '{}'", label_token))?;
    if !label.is_finite() {
        return Err(format!("non-finite label '{}'", label_token));
    }

    let mut entries = Vec::new();
    let mut last_index = 0usize;

    for (pos, token) in tokens.enumerate() {
        let (key, value) = token
            .split_once(':')
            .ok_or_else(|| format!("expected <index>:<value>, got '{}'", token))?;

        if pos == 0 && key == "qid" {
            continue;
        }

        let index: usize = key
            .parse()
            .map_err(|_| format!("invalid feature index '{}'", key))?;
        if index == 0 {
            return Err("feature indices are 1-based, got 0".to_string());
        }
        if index <= last_index {
            return Err(format!(
                "feature index {} is not ascending after {}",
                index, last_index
            ));
        }
        let value: f64 = value
            .parse()
            .map_err(|_| format!("invalid value '{}' for feature {}", value, index))?;
        if !value.is_finite() {
            return Err(format!("non-finite value for feature {}", index));
        }

        last_index = index;
        entries.push((index - 1, value));
    }

    Ok(Some(SvmRecord { label, entries }))
}

/// Parse every record from a reader, attributing errors to `path`.
///
/// Records come back paired with their 1-based line number. With
/// `max_features` set, an index above it cannot be reconciled with a
/// fixed-width dataset and is reported as malformed.
pub fn parse_reader<R: BufRead>(
    path: &Path,
    reader: R,
    max_features: Option<usize>,
) -> Result<Vec<(usize, SvmRecord)>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| TrackError::io(path, e))?;
        let parsed = parse_line(&line).and_then(|record| match (record, max_features) {
            (Some(rec), Some(limit)) if rec.max_index() > limit => Err(format!(
                "feature index {} exceeds the configured {} features",
                rec.max_index(),
                limit
            )),
            (record, _) => Ok(record),
        });
        match parsed {
            Ok(Some(record)) => records.push((idx + 1, record)),
            Ok(None) => {}
            Err(reason) => {
                return Err(TrackError::DataFormat {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason,
                })
            }
        }
    }
    Ok(records)
}
