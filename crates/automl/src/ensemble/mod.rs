mod selection;

use automl_data::handle::DatasetHandle;
use automl_data::target::TargetEncoding;
use automl_data::task::TaskKind;
use automl_execution::backend::Backend;
use automl_execution::id::ConfigurationId;
use automl_execution::worker::WorkerResult;
use automl_models::configuration::Configuration;
use automl_models::estimator::FittedModel;
use automl_models::metric::Metric;
use log::{info, warn};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
pub use selection::{select_greedy, Selection, SelectionCandidate};

use crate::error::{AutoMlError, AutoMlResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    pub configuration_id: ConfigurationId,
    pub configuration: Configuration,
    pub weight: f64,
}

/// The persisted description of an ensemble.
/// The fitted models stay in the worker artifacts of the members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRecord {
    pub dataset_id: String,
    pub task: TaskKind,
    pub metric: Metric,
    pub validation_score: f64,
    pub members: Vec<EnsembleMember>,
}

/// A weighted average of fitted models.
#[derive(Debug, Clone)]
pub struct Ensemble {
    record: EnsembleRecord,
    encoding: TargetEncoding,
    models: Vec<FittedModel>,
}

struct Loaded {
    configuration_id: ConfigurationId,
    configuration: Configuration,
    score: f64,
    model: FittedModel,
    predictions: Array2<f64>,
}

impl Ensemble {
    /// Builds the ensemble from the artifacts of the successful results.
    /// The dummy baseline result must be among them.
    pub fn build(
        backend: &Backend,
        dataset: &DatasetHandle,
        metric: Metric,
        results: &[WorkerResult],
        size: usize,
    ) -> AutoMlResult<Self> {
        let encoding = dataset.target_encoding();
        let (_, labels) = dataset.evaluation_rows();
        let mut loaded = vec![];
        for result in results.iter().filter(|r| r.is_success()) {
            let id = result.configuration_id;
            let artifact = match backend.load_worker_artifact(id) {
                Ok(x) => x,
                Err(e) => {
                    warn!("skipping configuration {id} for the ensemble: {e}");
                    continue;
                }
            };
            match (artifact.model, artifact.validation_predictions) {
                (Some(model), Some(predictions))
                    if predictions.dim() == (labels.nrows(), encoding.width()) =>
                {
                    loaded.push(Loaded {
                        configuration_id: id,
                        configuration: artifact.configuration,
                        score: artifact.validation_score.unwrap_or(f64::NEG_INFINITY),
                        model,
                        predictions,
                    });
                }
                _ => warn!("skipping configuration {id} without usable predictions"),
            }
        }
        if !loaded.iter().any(|x| x.configuration_id.is_dummy()) {
            return Err(AutoMlError::internal(
                "the dummy baseline is missing from the ensemble candidates",
            ));
        }
        // Selection ties go to the earlier candidate, so the strongest
        // individual candidates come first and the baseline comes last among equals.
        loaded.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then(
                a.configuration_id
                    .is_dummy()
                    .cmp(&b.configuration_id.is_dummy()),
            )
        });
        let candidates = loaded
            .iter()
            .map(|x| SelectionCandidate {
                configuration_id: x.configuration_id,
                predictions: x.predictions.view(),
            })
            .collect::<Vec<_>>();
        let selection = select_greedy(&candidates, &encoding, labels.view(), metric, size)?;

        let mut members = Vec::with_capacity(selection.weights.len());
        let mut models = Vec::with_capacity(selection.weights.len());
        for (id, weight) in selection.weights {
            if let Some(x) = loaded.iter().find(|x| x.configuration_id == id) {
                members.push(EnsembleMember {
                    configuration_id: id,
                    configuration: x.configuration.clone(),
                    weight,
                });
                models.push(x.model.clone());
            }
        }
        info!(
            "selected {} of {} candidates with holdout {metric} = {:.4}",
            members.len(),
            loaded.len(),
            selection.score
        );
        Ok(Self {
            record: EnsembleRecord {
                dataset_id: dataset.dataset_id.clone(),
                task: dataset.task,
                metric,
                validation_score: selection.score,
                members,
            },
            encoding,
            models,
        })
    }

    /// Loads a persisted ensemble and the models of its members.
    pub fn load(backend: &Backend) -> AutoMlResult<Self> {
        let record: EnsembleRecord = backend.load_ensemble()?;
        let mut models = Vec::with_capacity(record.members.len());
        for member in &record.members {
            let model = backend
                .load_worker_artifact(member.configuration_id)?
                .model
                .ok_or_else(|| {
                    AutoMlError::internal(format!(
                        "no model for ensemble member {}",
                        member.configuration_id
                    ))
                })?;
            models.push(model);
        }
        let encoding = models
            .first()
            .map(|m| m.encoding.clone())
            .ok_or_else(|| AutoMlError::internal("the ensemble has no members"))?;
        Ok(Self {
            record,
            encoding,
            models,
        })
    }

    pub fn record(&self) -> &EnsembleRecord {
        &self.record
    }

    pub fn members(&self) -> &[EnsembleMember] {
        &self.record.members
    }

    pub fn contains(&self, id: ConfigurationId) -> bool {
        self.members().iter().any(|m| m.configuration_id == id)
    }

    pub fn metric(&self) -> Metric {
        self.record.metric
    }

    pub fn validation_score(&self) -> f64 {
        self.record.validation_score
    }

    pub fn encoding(&self) -> &TargetEncoding {
        &self.encoding
    }

    /// The weighted average of the member score matrices.
    pub fn predict_scores(&self, x: ArrayView2<f64>) -> AutoMlResult<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((x.nrows(), self.encoding.width()));
        for (member, model) in self.record.members.iter().zip(&self.models) {
            let scores = model.predict_scores(x)?;
            if scores.dim() != out.dim() {
                return Err(AutoMlError::internal(format!(
                    "configuration {} predicted shape {:?}, expected {:?}",
                    member.configuration_id,
                    scores.dim(),
                    out.dim()
                )));
            }
            out.scaled_add(member.weight, &scores);
        }
        Ok(out)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> AutoMlResult<Array2<f64>> {
        let scores = self.predict_scores(x)?;
        Ok(self.encoding.decode(scores.view()))
    }
}
