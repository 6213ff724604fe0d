use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use automl_models::estimator::FittedModel;
use automl_telemetry::common::{ContextPropagationEnv, SpanAttribute};
use fastrace::collector::SpanContext;
use fastrace::Span;
use log::{info, warn};
use ndarray::Array2;

use crate::backend::Backend;
use crate::error::{ExecutionError, ExecutionResult};
use crate::worker::{WorkerArtifact, WorkerStatus, WorkerTask};

struct Evaluation {
    model: FittedModel,
    predictions: Array2<f64>,
    score: f64,
}

/// Runs the task in the file and persists the worker artifact.
///
/// The candidate is fitted on a separate thread. If the thread does not finish
/// within the time limit, a timed-out artifact is written and this function returns
/// while the thread is still running, so the caller should exit the process.
/// Fit errors and panics produce a crashed artifact.
pub fn run_worker(task_path: &Path) -> ExecutionResult<WorkerStatus> {
    let task = Backend::read_task(task_path)?;
    let span = match std::env::var(ContextPropagationEnv::TRACEPARENT) {
        Ok(x) => {
            let Some(span_context) = SpanContext::decode_w3c_traceparent(&x) else {
                return Err(ExecutionError::invalid(format!("traceparent: {x}")));
            };
            Span::root("worker", span_context).with_property(|| {
                (
                    SpanAttribute::WORKER_CONFIGURATION_ID,
                    task.configuration_id.to_string(),
                )
            })
        }
        Err(_) => Span::noop(),
    };
    let _guard = span.set_local_parent();

    let backend = Backend::new(&task.output_directory, &task.temp_directory);
    let start = Instant::now();
    info!(
        "worker {} evaluating {} within {:.1}s",
        task.configuration_id, task.configuration, task.time_limit_secs
    );

    let (tx, rx) = mpsc::channel();
    {
        let backend = backend.clone();
        let task = task.clone();
        thread::Builder::new()
            .name(format!("evaluate-{}", task.configuration_id))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| evaluate(&backend, &task)));
                let _ = tx.send(result);
            })?;
    }

    let artifact = match rx.recv_timeout(task.time_limit()) {
        Ok(Ok(Ok(evaluation))) => WorkerArtifact {
            configuration_id: task.configuration_id,
            configuration: task.configuration.clone(),
            status: WorkerStatus::Success,
            validation_score: Some(evaluation.score),
            elapsed_secs: start.elapsed().as_secs_f64(),
            message: None,
            model: Some(evaluation.model),
            validation_predictions: Some(evaluation.predictions),
        },
        Ok(Ok(Err(e))) => {
            WorkerArtifact::failed(&task, WorkerStatus::Crashed, start.elapsed(), e.to_string())
        }
        Ok(Err(payload)) => WorkerArtifact::failed(
            &task,
            WorkerStatus::Crashed,
            start.elapsed(),
            format!("evaluation panicked: {}", panic_message(payload.as_ref())),
        ),
        Err(RecvTimeoutError::Timeout) => WorkerArtifact::failed(
            &task,
            WorkerStatus::TimedOut,
            start.elapsed(),
            format!("time limit of {:.1}s exceeded", task.time_limit_secs),
        ),
        Err(RecvTimeoutError::Disconnected) => WorkerArtifact::failed(
            &task,
            WorkerStatus::Crashed,
            start.elapsed(),
            "evaluation thread exited without a result",
        ),
    };
    if let Some(message) = &artifact.message {
        warn!("worker {} {}: {message}", task.configuration_id, artifact.status);
    }
    span.add_property(|| (SpanAttribute::WORKER_STATUS, artifact.status.to_string()));
    backend.persist_worker_artifact(&artifact)?;
    Ok(artifact.status)
}

fn evaluate(backend: &Backend, task: &WorkerTask) -> ExecutionResult<Evaluation> {
    let handle = backend.load_data_manager()?;
    let encoding = handle.target_encoding();
    let (x, y) = handle.train_rows();
    let model = FittedModel::fit(&task.configuration, &encoding, x.view(), y.view())?;
    let (x, y) = handle.evaluation_rows();
    let predictions = model.predict_scores(x.view())?;
    let score = task.metric.score(&encoding, y.view(), predictions.view())?;
    if !score.is_finite() {
        return Err(ExecutionError::internal(format!("non-finite score: {score}")));
    }
    Ok(Evaluation {
        model,
        predictions,
        score,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use automl_data::manager::DataManager;
    use automl_models::configuration::{Algorithm, Configuration};
    use automl_models::metric::Metric;

    use super::*;
    use crate::id::ConfigurationId;

    fn setup(root: &Path) -> Backend {
        let backend = Backend::new(root.join("output"), root.join("tmp"));
        backend.ensure_internals_directory().unwrap();
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i % 2) * 10 + j) as f64 + i as f64 * 0.01);
        let y = Array2::from_shape_fn((40, 1), |(i, _)| (i % 2) as f64);
        let handle = DataManager::default().from_arrays("pairs", x, y, None).unwrap();
        backend.persist_data_manager(&handle).unwrap();
        backend
    }

    fn write_task(backend: &Backend, configuration: Configuration, time_limit_secs: f64) -> PathBuf {
        let task = WorkerTask {
            configuration_id: ConfigurationId::from(2),
            configuration,
            output_directory: backend.output_directory().to_path_buf(),
            temp_directory: backend.temp_directory().to_path_buf(),
            time_limit_secs,
            seed: 1,
            metric: Metric::Accuracy,
        };
        backend.write_task(&task).unwrap()
    }

    #[test]
    fn test_run_worker_success() {
        let root = tempfile::tempdir().unwrap();
        let backend = setup(root.path());
        let configuration = Configuration::new(
            Algorithm::KNearestNeighbors {
                neighbors: 3,
                distance_weighted: false,
            },
            true,
        );
        let path = write_task(&backend, configuration, 30.0);
        assert_eq!(run_worker(&path).unwrap(), WorkerStatus::Success);
        let artifact = backend.load_worker_artifact(ConfigurationId::from(2)).unwrap();
        assert_eq!(artifact.status, WorkerStatus::Success);
        assert_eq!(artifact.validation_score, Some(1.0));
        assert!(artifact.model.is_some());
        let holdout = backend.load_data_manager().unwrap().splits.evaluation_rows().len();
        assert_eq!(
            artifact.validation_predictions.map(|p| p.nrows()),
            Some(holdout)
        );
    }

    #[test]
    fn test_run_worker_fit_error_is_crash() {
        let root = tempfile::tempdir().unwrap();
        let backend = setup(root.path());
        let configuration = Configuration::new(
            Algorithm::KNearestNeighbors {
                neighbors: 0,
                distance_weighted: false,
            },
            false,
        );
        let path = write_task(&backend, configuration, 30.0);
        assert_eq!(run_worker(&path).unwrap(), WorkerStatus::Crashed);
        let artifact = backend.load_worker_artifact(ConfigurationId::from(2)).unwrap();
        assert!(artifact.message.is_some());
        assert!(artifact.model.is_none());
    }

    #[test]
    fn test_run_worker_missing_data_manager_is_crash() {
        let root = tempfile::tempdir().unwrap();
        let backend = Backend::new(root.path().join("output"), root.path().join("tmp"));
        backend.ensure_internals_directory().unwrap();
        let path = write_task(&backend, Configuration::dummy(), 30.0);
        assert_eq!(run_worker(&path).unwrap(), WorkerStatus::Crashed);
    }

    #[test]
    fn test_run_worker_panic_is_crash() {
        let root = tempfile::tempdir().unwrap();
        let backend = setup(root.path());
        // Training rows that point past the data make row selection panic.
        let path = backend.data_manager_path();
        let mut handle: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        handle["splits"]["train"] = serde_json::json!([0, 1, 999]);
        std::fs::write(&path, serde_json::to_vec(&handle).unwrap()).unwrap();

        let path = write_task(&backend, Configuration::dummy(), 30.0);
        assert_eq!(run_worker(&path).unwrap(), WorkerStatus::Crashed);
        let artifact = backend.load_worker_artifact(ConfigurationId::from(2)).unwrap();
        assert_eq!(artifact.status, WorkerStatus::Crashed);
        assert!(artifact
            .message
            .unwrap()
            .starts_with("evaluation panicked"));
        assert!(artifact.model.is_none());
    }

    #[test]
    fn test_run_worker_zero_time_limit_times_out() {
        let root = tempfile::tempdir().unwrap();
        let backend = setup(root.path());
        let configuration = Configuration::new(
            Algorithm::LogisticRegression {
                learning_rate: 0.1,
                epochs: 100_000,
                l2: 0.0,
            },
            false,
        );
        let path = write_task(&backend, configuration, 0.0);
        assert_eq!(run_worker(&path).unwrap(), WorkerStatus::TimedOut);
    }
}
