//! Directory loader for SVM feature files

use super::dataset::Dataset;
use super::svm::{parse_reader, SvmRecord};
use crate::error::{Result, TrackError};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Default ceiling on dense feature cells (rows x width), 16 GiB of `f64`
pub const DEFAULT_MAX_CELLS: usize = 1 << 31;

/// Cells the allocator could ever address for an `f64` matrix
const ADDRESSABLE_CELLS: usize = isize::MAX as usize / std::mem::size_of::<f64>();

fn default_max_cells() -> usize {
    DEFAULT_MAX_CELLS
}

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Fixed feature width. `None` means the widest index seen across all files.
    pub num_features: Option<usize>,
    /// Only read files with one of these extensions (no leading dot).
    /// `None` reads every non-hidden regular file.
    pub extensions: Option<Vec<String>>,
    /// Largest dense matrix the loader will allocate, in cells
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            num_features: None,
            extensions: None,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl LoaderConfig {
    pub fn with_num_features(mut self, n: usize) -> Self {
        self.num_features = Some(n);
        self
    }

    pub fn with_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(exts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_cells(mut self, cells: usize) -> Self {
        self.max_cells = cells;
        self
    }

    /// Effective cell budget, never above what one allocation can address
    pub fn cell_budget(&self) -> usize {
        self.max_cells.min(ADDRESSABLE_CELLS)
    }
}

/// Reads every SVM file in a directory into a single [`Dataset`]
#[derive(Debug, Clone, Default)]
pub struct DatasetLoader {
    config: LoaderConfig,
}

impl DatasetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Data files in `dir`, sorted by file name
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| TrackError::io(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TrackError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() || !self.accepts(&path) {
                continue;
            }
            files.push(path);
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };
        if name.starts_with('.') {
            return false;
        }
        match &self.config.extensions {
            None => true,
            Some(exts) => path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |ext| exts.iter().any(|allowed| allowed == ext)),
        }
    }

    /// Load and concatenate every data file in `dir`
    pub fn load(&self, dir: impl AsRef<Path>) -> Result<Dataset> {
        let dir = dir.as_ref();
        let start = Instant::now();
        let files = self.list_files(dir)?;

        let limit = self.config.num_features;
        // Parse in parallel, then surface the first failure in file order.
        let parsed: Vec<Result<Vec<(usize, SvmRecord)>>> = files
            .par_iter()
            .map(|path| {
                let file = File::open(path).map_err(|e| TrackError::io(path, e))?;
                let records = parse_reader(path, BufReader::new(file), limit)?;
                debug!(file = %path.display(), records = records.len(), "parsed SVM file");
                Ok(records)
            })
            .collect();
        let per_file = parsed.into_iter().collect::<Result<Vec<_>>>()?;

        let n_rows: usize = per_file.iter().map(Vec::len).sum();
        if n_rows == 0 {
            return Err(TrackError::EmptyDataset {
                path: dir.to_path_buf(),
            });
        }

        let width = match limit {
            Some(n) => n,
            None => per_file
                .iter()
                .flatten()
                .map(|(_, record)| record.max_index())
                .max()
                .unwrap_or(0),
        };
        self.check_budget(&files, &per_file, n_rows, width)?;

        let records = per_file.iter().flatten().map(|(_, record)| record);
        let (features, labels) = densify(records, n_rows, width);
        let dataset = Dataset::new(features, labels, files)?;

        info!(
            dir = %dir.display(),
            files = dataset.sources().len(),
            rows = dataset.n_samples(),
            features = dataset.n_features(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Reject a dense shape above the cell budget before allocating it.
    ///
    /// A width inferred from the data is blamed on the first record that
    /// reaches it; a configured width is a configuration error.
    fn check_budget(
        &self,
        files: &[PathBuf],
        per_file: &[Vec<(usize, SvmRecord)>],
        n_rows: usize,
        width: usize,
    ) -> Result<()> {
        let budget = self.config.cell_budget();
        let cells = n_rows.checked_mul(width);
        if cells.map_or(false, |c| c <= budget) {
            return Ok(());
        }
        let needed = match cells {
            Some(c) => format!("{} cells", c),
            None => "more cells than fit in usize".to_string(),
        };

        let widest = match self.config.num_features {
            Some(_) => None,
            None => files.iter().zip(per_file).find_map(|(path, records)| {
                records
                    .iter()
                    .find(|(_, record)| record.max_index() == width)
                    .map(|(line, _)| (path, *line))
            }),
        };
        Err(match widest {
            Some((path, line)) => TrackError::DataFormat {
                path: path.clone(),
                line,
                reason: format!(
                    "feature index {} over {} rows needs {}, above the limit of {}",
                    width, n_rows, needed, budget
                ),
            },
            None => TrackError::Config(format!(
                "{} rows x {} features needs {}, above the limit of {}",
                n_rows, width, needed, budget
            )),
        })
    }
}

/// Scatter sparse records into a zero-filled dense matrix
fn densify<'a>(
    records: impl Iterator<Item = &'a SvmRecord>,
    n_rows: usize,
    width: usize,
) -> (Array2<f64>, Array1<f64>) {
    let mut features = Array2::zeros((n_rows, width));
    let mut labels = Array1::zeros(n_rows);
    for (row, record) in records.enumerate() {
        labels[row] = record.label;
        for &(col, value) in &record.entries {
            features[[row, col]] = value;
        }
    }
    (features, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, content: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_concatenates_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.txt", "0 1:2.0\n");
        write(dir.path(), "a.txt", "1 2:1.0\n1 1:3.0\n");

        let ds = DatasetLoader::default().load(dir.path()).unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.labels().to_vec(), vec![1.0, 1.0, 0.0]);
        assert_eq!(ds.features()[[0, 1]], 1.0);
        assert_eq!(ds.features()[[0, 0]], 0.0);
        assert_eq!(ds.features()[[2, 0]], 2.0);
        assert!(ds.sources()[0].ends_with("a.txt"));
    }

    #[test]
    fn test_load_reconciles_sparse_width() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "1 1:1\n");
        write(dir.path(), "b.txt", "0 5:1\n");

        let ds = DatasetLoader::default().load(dir.path()).unwrap();
        assert_eq!(ds.n_features(), 5);
        assert_eq!(ds.features()[[0, 4]], 0.0);
        assert_eq!(ds.features()[[1, 4]], 1.0);
    }

    #[test]
    fn test_load_fixed_width() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "1 1:1 2:1\n");

        let loader = DatasetLoader::new(LoaderConfig::default().with_num_features(6));
        let ds = loader.load(dir.path()).unwrap();
        assert_eq!(ds.n_features(), 6);
    }

    #[test]
    fn test_cell_budget_is_capped_by_address_space() {
        let config = LoaderConfig::default().with_max_cells(usize::MAX);
        assert!(config.cell_budget() < usize::MAX);
        assert_eq!(LoaderConfig::default().cell_budget(), DEFAULT_MAX_CELLS);
    }

    #[test]
    fn test_load_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetLoader::default().load(dir.path()).unwrap_err();
        assert!(matches!(err, TrackError::EmptyDataset { .. }));
    }

    #[test]
    fn test_load_only_blank_lines_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "\n   \n# comment\n");
        let err = DatasetLoader::default().load(dir.path()).unwrap_err();
        assert!(matches!(err, TrackError::EmptyDataset { .. }));
    }

    #[test]
    fn test_load_skips_hidden_and_filtered_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".hidden", "not svm at all\n");
        write(dir.path(), "notes.md", "# readme\nnot svm\n");
        write(dir.path(), "a.txt", "1 1:1\n");

        let loader = DatasetLoader::new(LoaderConfig::default().with_extensions(["txt"]));
        let ds = loader.load(dir.path()).unwrap();
        assert_eq!(ds.n_samples(), 1);
    }

    #[test]
    fn test_load_missing_directory() {
        let err = DatasetLoader::default()
            .load("/definitely/not/a/real/dir")
            .unwrap_err();
        assert!(matches!(err, TrackError::Io { .. }));
    }
}
