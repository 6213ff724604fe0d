use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use automl_data::handle::DatasetHandle;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ExecutionError, ExecutionResult};
use crate::id::ConfigurationId;
use crate::worker::{WorkerArtifact, WorkerTask};

const INTERNALS_DIRECTORY: &str = ".internal";
const PREDICTIONS_DIRECTORY: &str = "predictions";
const TASKS_DIRECTORY: &str = "tasks";
const DATA_MANAGER_FILE: &str = "datamanager.json";
const ENSEMBLE_FILE: &str = "ensemble.json";
const START_TIME_FILE_PREFIX: &str = "start_time_";

/// The on-disk state of a run.
///
/// Every write goes to a temporary file in the target directory
/// and is renamed into place, so readers never observe partial files.
#[derive(Debug, Clone)]
pub struct Backend {
    output_directory: PathBuf,
    temp_directory: PathBuf,
}

impl Backend {
    pub fn new(output_directory: impl Into<PathBuf>, temp_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
            temp_directory: temp_directory.into(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn temp_directory(&self) -> &Path {
        &self.temp_directory
    }

    pub fn internals_directory(&self) -> PathBuf {
        self.output_directory.join(INTERNALS_DIRECTORY)
    }

    pub fn predictions_directory(&self) -> PathBuf {
        self.internals_directory().join(PREDICTIONS_DIRECTORY)
    }

    pub fn tasks_directory(&self) -> PathBuf {
        self.temp_directory.join(TASKS_DIRECTORY)
    }

    pub fn data_manager_path(&self) -> PathBuf {
        self.internals_directory().join(DATA_MANAGER_FILE)
    }

    pub fn start_time_path(&self, seed: u64) -> PathBuf {
        self.internals_directory()
            .join(format!("{START_TIME_FILE_PREFIX}{seed}"))
    }

    pub fn ensemble_path(&self) -> PathBuf {
        self.internals_directory().join(ENSEMBLE_FILE)
    }

    pub fn worker_artifact_path(&self, id: ConfigurationId) -> PathBuf {
        self.predictions_directory().join(id.to_string())
    }

    pub fn task_path(&self, id: ConfigurationId) -> PathBuf {
        self.tasks_directory().join(format!("{id}.json"))
    }

    /// Creates the run directories if they do not exist and checks that they are writable.
    pub fn ensure_internals_directory(&self) -> ExecutionResult<PathBuf> {
        for dir in [
            self.output_directory.clone(),
            self.internals_directory(),
            self.predictions_directory(),
            self.temp_directory.clone(),
            self.tasks_directory(),
        ] {
            if dir.exists() && !dir.is_dir() {
                return Err(ExecutionError::directory(format!(
                    "not a directory: {}",
                    dir.display()
                )));
            }
            fs::create_dir_all(&dir).map_err(|e| {
                ExecutionError::directory(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        for dir in [self.internals_directory(), self.tasks_directory()] {
            let probe = dir.join(format!(".probe.{}", uuid::Uuid::new_v4()));
            write_atomic(&probe, b"").map_err(|e| {
                ExecutionError::directory(format!("cannot write to {}: {e}", dir.display()))
            })?;
            let _ = fs::remove_file(&probe);
        }
        Ok(self.internals_directory())
    }

    /// Records the run start time for the seed.
    /// The start time can be overwritten until the ensemble of the run has been persisted.
    pub fn persist_start_time(&self, seed: u64, timestamp: f64) -> ExecutionResult<()> {
        if self.ensemble_path().exists() {
            return Err(ExecutionError::InvalidState(format!(
                "the run in {} has completed",
                self.output_directory.display()
            )));
        }
        let path = self.start_time_path(seed);
        write_atomic(&path, timestamp.to_string().as_bytes())?;
        debug!("persisted start time {timestamp} to {}", path.display());
        Ok(())
    }

    pub fn load_start_time(&self, seed: u64) -> ExecutionResult<f64> {
        let path = self.start_time_path(seed);
        let text = read_file(&path)?;
        let text = String::from_utf8(text).map_err(|e| ExecutionError::internal(e.to_string()))?;
        text.trim().parse::<f64>().map_err(|e| {
            ExecutionError::internal(format!("invalid start time in {}: {e}", path.display()))
        })
    }

    pub fn persist_data_manager(&self, handle: &DatasetHandle) -> ExecutionResult<PathBuf> {
        let path = self.data_manager_path();
        write_json(&path, handle)?;
        debug!("persisted data manager to {}", path.display());
        Ok(path)
    }

    pub fn load_data_manager(&self) -> ExecutionResult<DatasetHandle> {
        read_json(&self.data_manager_path())
    }

    pub fn persist_worker_artifact(&self, artifact: &WorkerArtifact) -> ExecutionResult<PathBuf> {
        let path = self.worker_artifact_path(artifact.configuration_id);
        write_json(&path, artifact)?;
        Ok(path)
    }

    pub fn load_worker_artifact(&self, id: ConfigurationId) -> ExecutionResult<WorkerArtifact> {
        read_json(&self.worker_artifact_path(id))
    }

    pub fn remove_worker_artifact(&self, id: ConfigurationId) -> ExecutionResult<()> {
        match fs::remove_file(self.worker_artifact_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the configurations that have left an artifact, in id order.
    pub fn list_worker_artifacts(&self) -> ExecutionResult<Vec<ConfigurationId>> {
        let mut ids = fs::read_dir(self.predictions_directory())?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u64>().ok())
            .map(ConfigurationId::from)
            .collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }

    pub fn persist_ensemble<T: Serialize>(&self, ensemble: &T) -> ExecutionResult<PathBuf> {
        let path = self.ensemble_path();
        write_json(&path, ensemble)?;
        Ok(path)
    }

    pub fn load_ensemble<T: DeserializeOwned>(&self) -> ExecutionResult<T> {
        read_json(&self.ensemble_path())
    }

    pub fn write_task(&self, task: &WorkerTask) -> ExecutionResult<PathBuf> {
        let path = self.task_path(task.configuration_id);
        write_json(&path, task)?;
        Ok(path)
    }

    pub fn read_task(path: &Path) -> ExecutionResult<WorkerTask> {
        read_json(path)
    }

    pub fn remove_task(&self, id: ConfigurationId) -> ExecutionResult<()> {
        match fs::remove_file(self.task_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> ExecutionResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| ExecutionError::invalid(format!("path has no parent: {}", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ExecutionError::invalid(format!("bad file name: {}", path.display())))?;
    let tmp = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
    let result = (|| {
        let mut f = OpenOptions::new().create_new(true).write(true).open(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ExecutionResult<()> {
    write_atomic(path, &serde_json::to_vec(value)?)
}

fn read_file(path: &Path) -> ExecutionResult<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ExecutionError::not_found(path.display().to_string()),
        _ => e.into(),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ExecutionResult<T> {
    Ok(serde_json::from_slice(&read_file(path)?)?)
}

#[cfg(test)]
mod tests {
    use automl_data::manager::DataManager;
    use automl_models::configuration::Configuration;
    use ndarray::Array2;

    use super::*;
    use crate::worker::WorkerStatus;

    fn backend(root: &Path) -> Backend {
        let backend = Backend::new(root.join("output"), root.join("tmp"));
        backend.ensure_internals_directory().unwrap();
        backend
    }

    #[test]
    fn test_ensure_internals_directory_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let backend = backend(root.path());
        assert!(backend.internals_directory().is_dir());
        assert!(backend.predictions_directory().is_dir());
        assert!(backend.ensure_internals_directory().is_ok());
        assert!(backend.list_worker_artifacts().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_internals_directory_rejects_file() {
        let root = tempfile::tempdir().unwrap();
        let output = root.path().join("output");
        fs::write(&output, "not a directory").unwrap();
        let backend = Backend::new(&output, root.path().join("tmp"));
        assert!(matches!(
            backend.ensure_internals_directory(),
            Err(ExecutionError::DirectoryError(_))
        ));
    }

    #[test]
    fn test_start_time() {
        let root = tempfile::tempdir().unwrap();
        let backend = backend(root.path());
        assert!(matches!(
            backend.load_start_time(1),
            Err(ExecutionError::NotFound(_))
        ));
        backend.persist_start_time(1, 1700000000.25).unwrap();
        backend.persist_start_time(1, 1700000001.5).unwrap();
        assert_eq!(backend.load_start_time(1).unwrap(), 1700000001.5);
        assert!(backend.start_time_path(1).ends_with(".internal/start_time_1"));

        backend.persist_ensemble(&vec![1u64]).unwrap();
        assert!(matches!(
            backend.persist_start_time(1, 1700000002.0),
            Err(ExecutionError::InvalidState(_))
        ));
    }

    #[test]
    fn test_data_manager_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let backend = backend(root.path());
        assert!(matches!(
            backend.load_data_manager(),
            Err(ExecutionError::NotFound(_))
        ));
        let x = Array2::from_shape_fn((20, 3), |(i, j)| (i as f64).sin() * (j as f64 + 0.1));
        let y = Array2::from_shape_fn((20, 1), |(i, _)| (i % 3) as f64);
        let handle = DataManager::default().from_arrays("sines", x, y, None).unwrap();
        backend.persist_data_manager(&handle).unwrap();
        let loaded = backend.load_data_manager().unwrap();
        assert_eq!(loaded, *handle);
    }

    #[test]
    fn test_worker_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let backend = backend(root.path());
        let task = WorkerTask {
            configuration_id: ConfigurationId::from(3),
            configuration: Configuration::dummy(),
            output_directory: backend.output_directory().to_path_buf(),
            temp_directory: backend.temp_directory().to_path_buf(),
            time_limit_secs: 1.0,
            seed: 1,
            metric: automl_models::metric::Metric::Accuracy,
        };
        let path = backend.write_task(&task).unwrap();
        assert_eq!(Backend::read_task(&path).unwrap(), task);

        let artifact = WorkerArtifact::failed(
            &task,
            WorkerStatus::Crashed,
            std::time::Duration::from_millis(5),
            "boom",
        );
        backend.persist_worker_artifact(&artifact).unwrap();
        assert_eq!(
            backend.load_worker_artifact(task.configuration_id).unwrap(),
            artifact
        );
        assert_eq!(
            backend.list_worker_artifacts().unwrap(),
            vec![ConfigurationId::from(3)]
        );
        backend.remove_worker_artifact(task.configuration_id).unwrap();
        backend.remove_worker_artifact(task.configuration_id).unwrap();
        assert!(matches!(
            backend.load_worker_artifact(task.configuration_id),
            Err(ExecutionError::NotFound(_))
        ));
    }
}
