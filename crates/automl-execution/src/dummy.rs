use std::time::Instant;

use automl_data::handle::DatasetHandle;
use automl_models::configuration::Configuration;
use automl_models::estimator::FittedModel;
use automl_models::metric::Metric;
use log::info;

use crate::backend::Backend;
use crate::error::ExecutionResult;
use crate::id::ConfigurationId;
use crate::worker::{WorkerArtifact, WorkerResult, WorkerStatus};

/// Evaluates the constant baseline in the calling thread.
///
/// The baseline predicts the training class frequencies (so the most frequent
/// class wins) or the training mean. Its artifact is persisted under
/// [`ConfigurationId::DUMMY`] before any search worker starts.
pub struct DummyEvaluator {
    backend: Backend,
    metric: Metric,
}

impl DummyEvaluator {
    pub fn new(backend: Backend, metric: Metric) -> Self {
        Self { backend, metric }
    }

    pub fn evaluate(&self, handle: &DatasetHandle) -> ExecutionResult<WorkerResult> {
        let start = Instant::now();
        let configuration = Configuration::dummy();
        let encoding = handle.target_encoding();
        let (x, y) = handle.train_rows();
        let model = FittedModel::fit(&configuration, &encoding, x.view(), y.view())?;
        let (x, y) = handle.evaluation_rows();
        let predictions = model.predict_scores(x.view())?;
        let score = self.metric.score(&encoding, y.view(), predictions.view())?;
        let artifact = WorkerArtifact {
            configuration_id: ConfigurationId::DUMMY,
            configuration,
            status: WorkerStatus::Success,
            validation_score: Some(score),
            elapsed_secs: start.elapsed().as_secs_f64(),
            message: None,
            model: Some(model),
            validation_predictions: Some(predictions),
        };
        let path = self.backend.persist_worker_artifact(&artifact)?;
        info!(
            "dummy baseline {} = {score:.4} for {}",
            self.metric, handle.dataset_id
        );
        Ok(WorkerResult::from_artifact(&artifact, path))
    }
}

#[cfg(test)]
mod tests {
    use automl_data::manager::DataManager;
    use automl_data::task::TaskKind;
    use ndarray::Array2;

    use super::*;

    #[test]
    fn test_dummy_evaluator() {
        let root = tempfile::tempdir().unwrap();
        let backend = Backend::new(root.path().join("output"), root.path().join("tmp"));
        backend.ensure_internals_directory().unwrap();
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i + j) as f64);
        let y = Array2::from_shape_fn((30, 1), |(i, _)| if i % 3 == 0 { 1.0 } else { 0.0 });
        let handle = DataManager::default()
            .from_arrays("imbalanced", x, y, None)
            .unwrap();
        assert_eq!(handle.task, TaskKind::BinaryClassification);

        let evaluator = DummyEvaluator::new(backend.clone(), Metric::Accuracy);
        let result = evaluator.evaluate(&handle).unwrap();
        assert!(result.is_success());
        assert!(result.configuration_id.is_dummy());
        let score = result.validation_score.unwrap();
        assert!((0.0..=1.0).contains(&score));

        let artifact = backend.load_worker_artifact(ConfigurationId::DUMMY).unwrap();
        let model = artifact.model.unwrap();
        let predicted = model.predict(handle.x_train.view()).unwrap();
        assert!(predicted.iter().all(|&v| v == 0.0));
    }
}
