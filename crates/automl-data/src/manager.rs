use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use log::debug;
use ndarray::Array2;

use crate::error::{DataError, DataResult};
use crate::format::{dataset_files, read_dataset};
use crate::handle::{DatasetHandle, DatasetParts};
use crate::split::SplitOptions;
use crate::task::TaskKind;

/// The length and modification time of every file composing a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileSignature(Vec<(PathBuf, u64, Option<SystemTime>)>);

impl FileSignature {
    fn of(files: &[PathBuf]) -> DataResult<Self> {
        let entries = files
            .iter()
            .map(|file| {
                let metadata = std::fs::metadata(file)?;
                Ok((file.clone(), metadata.len(), metadata.modified().ok()))
            })
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Self(entries))
    }
}

struct CachedDataset {
    signature: FileSignature,
    handle: Arc<DatasetHandle>,
}

/// Loads datasets and caches them by canonical path.
pub struct DataManager {
    options: SplitOptions,
    entries: Mutex<HashMap<PathBuf, CachedDataset>>,
}

impl DataManager {
    pub fn new(options: SplitOptions) -> Self {
        Self {
            options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the dataset at the path.
    /// A repeated load of an unchanged dataset returns the cached handle without parsing.
    pub fn load(&self, path: impl AsRef<Path>) -> DataResult<Arc<DatasetHandle>> {
        let path = path.as_ref();
        let path = path.canonicalize().map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                DataError::format(format!("dataset not found: {}", path.display()))
            }
            _ => DataError::IoError(e),
        })?;
        let signature = FileSignature::of(&dataset_files(&path)?)?;
        {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get(&path) {
                if entry.signature == signature {
                    debug!("dataset cache hit: {}", path.display());
                    return Ok(Arc::clone(&entry.handle));
                }
            }
        }

        debug!("loading dataset: {}", path.display());
        let parts = read_dataset(&path)?;
        let handle = Arc::new(DatasetHandle::try_new(parts, &self.options)?);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            path,
            CachedDataset {
                signature,
                handle: Arc::clone(&handle),
            },
        );
        Ok(handle)
    }

    /// Builds a handle from in-memory arrays. The result is not cached.
    pub fn from_arrays(
        &self,
        dataset_id: impl Into<String>,
        x: Array2<f64>,
        y: Array2<f64>,
        task: Option<TaskKind>,
    ) -> DataResult<Arc<DatasetHandle>> {
        let parts = DatasetParts {
            dataset_id: dataset_id.into(),
            x_train: x,
            y_train: y,
            task,
            ..Default::default()
        };
        Ok(Arc::new(DatasetHandle::try_new(parts, &self.options)?))
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached dataset.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

impl Default for DataManager {
    fn default() -> Self {
        Self::new(SplitOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_csv(path: &Path, rows: usize) {
        let mut text = String::from("x1,x2,y\n");
        for i in 0..rows {
            text.push_str(&format!("{},{},{}\n", i as f64 * 0.5, i % 7, i % 2));
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        write_csv(&path, 20);
        let manager = DataManager::default();
        let first = manager.load(&path).unwrap();
        let second = manager.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.len(), 1);
        assert_eq!(first.task, TaskKind::BinaryClassification);
    }

    #[test]
    fn test_load_reparses_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        write_csv(&path, 20);
        let manager = DataManager::default();
        let first = manager.load(&path).unwrap();
        write_csv(&path, 30);
        let second = manager.load(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.n_rows(), 30);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_load_identical_content_across_managers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        write_csv(&path, 25);
        let first = DataManager::default().load(&path).unwrap();
        let second = DataManager::default().load(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DataManager::default();
        assert!(matches!(
            manager.load(dir.path().join("missing.csv")),
            Err(DataError::DatasetFormat(_))
        ));
        let path = dir.path().join("empty.csv");
        fs::write(&path, "a,b,y\n").unwrap();
        assert!(matches!(
            manager.load(&path),
            Err(DataError::DatasetEmpty(_))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        write_csv(&path, 10);
        let manager = DataManager::default();
        manager.load(&path).unwrap();
        manager.clear();
        assert!(manager.is_empty());
    }
}
