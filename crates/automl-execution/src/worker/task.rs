use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use automl_models::configuration::Configuration;
use automl_models::estimator::FittedModel;
use automl_models::metric::Metric;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::id::ConfigurationId;

/// The evaluation of one candidate configuration, handed to a worker process as a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub configuration_id: ConfigurationId,
    pub configuration: Configuration,
    pub output_directory: PathBuf,
    pub temp_directory: PathBuf,
    pub time_limit_secs: f64,
    pub seed: u64,
    pub metric: Metric,
}

impl WorkerTask {
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs).unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Success,
    TimedOut,
    Crashed,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Success => write!(f, "success"),
            WorkerStatus::TimedOut => write!(f, "timed-out"),
            WorkerStatus::Crashed => write!(f, "crashed"),
        }
    }
}

/// The file a worker leaves behind in the predictions directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerArtifact {
    pub configuration_id: ConfigurationId,
    pub configuration: Configuration,
    pub status: WorkerStatus,
    pub validation_score: Option<f64>,
    pub elapsed_secs: f64,
    pub message: Option<String>,
    pub model: Option<FittedModel>,
    /// Score matrix predictions for the holdout rows.
    pub validation_predictions: Option<Array2<f64>>,
}

impl WorkerArtifact {
    pub fn failed(
        task: &WorkerTask,
        status: WorkerStatus,
        elapsed: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            configuration_id: task.configuration_id,
            configuration: task.configuration.clone(),
            status,
            validation_score: None,
            elapsed_secs: elapsed.as_secs_f64(),
            message: Some(message.into()),
            model: None,
            validation_predictions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult {
    pub configuration_id: ConfigurationId,
    pub configuration: Configuration,
    pub validation_score: Option<f64>,
    pub model_artifact_path: PathBuf,
    pub elapsed_time: Duration,
    pub status: WorkerStatus,
    pub message: Option<String>,
}

impl WorkerResult {
    pub fn from_artifact(artifact: &WorkerArtifact, model_artifact_path: PathBuf) -> Self {
        Self {
            configuration_id: artifact.configuration_id,
            configuration: artifact.configuration.clone(),
            validation_score: artifact.validation_score,
            model_artifact_path,
            elapsed_time: Duration::try_from_secs_f64(artifact.elapsed_secs)
                .unwrap_or(Duration::ZERO),
            status: artifact.status,
            message: artifact.message.clone(),
        }
    }

    /// The result of a worker that left no usable artifact.
    pub fn crashed(
        configuration_id: ConfigurationId,
        configuration: Configuration,
        model_artifact_path: PathBuf,
        elapsed_time: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            configuration_id,
            configuration,
            validation_score: None,
            model_artifact_path,
            elapsed_time,
            status: WorkerStatus::Crashed,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkerStatus::Success
    }
}
