use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use automl_common::config::AppConfig;
use automl_common::datetime::unix_epoch_secs;
use automl_data::handle::DatasetHandle;
use automl_data::manager::DataManager;
use automl_data::task::TaskKind;
use automl_execution::backend::Backend;
use automl_execution::dispatcher::{
    Candidate, DispatchRequest, DispatcherOptions, RunDispatcher, WorkerOutcome,
};
use automl_execution::dummy::DummyEvaluator;
use automl_execution::id::ConfigurationIdGenerator;
use automl_execution::worker_manager::{ProcessWorkerManager, WorkerManager};
use automl_models::metric::Metric;
use automl_models::space::ConfigurationSpace;
use automl_telemetry::common::SpanAttribute;
use automl_telemetry::recorder::record_error;
use fastrace::collector::SpanContext;
use fastrace::future::FutureExt;
use fastrace::Span;
use log::{error, info};
use ndarray::{Array2, ArrayView2};

use crate::controller::options::AutoMlOptions;
use crate::controller::state::RunState;
use crate::ensemble::Ensemble;
use crate::error::{AutoMlError, AutoMlResult};

const IN_MEMORY_DATASET_ID: &str = "in-memory";

/// Searches candidate pipelines for a dataset within a time budget
/// and keeps the ensemble of the best ones.
///
/// A controller runs at most one fit. The dummy baseline is evaluated before
/// any candidate is dispatched, so a fit that gets past data loading always
/// ends with a usable ensemble.
pub struct AutoMl {
    options: AutoMlOptions,
    backend: Backend,
    data_manager: DataManager,
    dispatcher: RunDispatcher,
    state: RunState,
    dataset: Option<Arc<DatasetHandle>>,
    ensemble: Option<Ensemble>,
    dispatch_summary: Vec<(Candidate, WorkerOutcome)>,
}

impl AutoMl {
    /// Creates a controller that launches workers with the configured worker program.
    pub fn new(config: AppConfig) -> AutoMlResult<Self> {
        let worker_manager = ProcessWorkerManager::try_from_config(&config.worker)?;
        Self::with_worker_manager(config, Arc::new(worker_manager))
    }

    pub fn with_worker_manager(
        config: AppConfig,
        worker_manager: Arc<dyn WorkerManager>,
    ) -> AutoMlResult<Self> {
        let options = AutoMlOptions::try_new(&config)?;
        let backend = Backend::new(
            options.output_directory.clone(),
            options.temp_directory.clone(),
        );
        let data_manager = DataManager::new(options.split);
        let dispatcher = RunDispatcher::new(DispatcherOptions::new(&config, worker_manager));
        Ok(Self {
            options,
            backend,
            data_manager,
            dispatcher,
            state: RunState::Idle,
            dataset: None,
            ensemble: None,
            dispatch_summary: vec![],
        })
    }

    pub fn options(&self) -> &AutoMlOptions {
        &self.options
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The task of the fitted dataset, known once the data has been loaded.
    pub fn task(&self) -> Option<TaskKind> {
        self.dataset.as_ref().map(|x| x.task)
    }

    pub fn dataset(&self) -> Option<&DatasetHandle> {
        self.dataset.as_deref()
    }

    pub fn ensemble(&self) -> Option<&Ensemble> {
        self.ensemble.as_ref()
    }

    /// The outcome of every candidate of the last dispatch, in dispatch order.
    pub fn dispatch_summary(&self) -> &[(Candidate, WorkerOutcome)] {
        &self.dispatch_summary
    }

    /// Fits in-memory features and labels.
    /// The task is inferred from the labels unless given explicitly.
    pub async fn fit(
        &mut self,
        x: Array2<f64>,
        y: Array2<f64>,
        task: Option<TaskKind>,
    ) -> AutoMlResult<()> {
        let started_at = self.begin()?;
        let dataset = self
            .data_manager
            .from_arrays(IN_MEMORY_DATASET_ID, x, y, task)
            .map_err(AutoMlError::from);
        self.fit_dataset(started_at, dataset).await
    }

    /// Fits a dataset directory or a delimited file.
    pub async fn fit_from_dataset_path(&mut self, path: impl AsRef<Path>) -> AutoMlResult<()> {
        let started_at = self.begin()?;
        let dataset = self
            .data_manager
            .load(path.as_ref())
            .map_err(AutoMlError::from);
        self.fit_dataset(started_at, dataset).await
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> AutoMlResult<Array2<f64>> {
        self.fitted_ensemble()?.predict(x)
    }

    /// Scores the ensemble with the metric of the run.
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> AutoMlResult<f64> {
        let ensemble = self.fitted_ensemble()?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| AutoMlError::internal("fitted without a dataset"))?;
        if x.nrows() != y.nrows() {
            return Err(AutoMlError::invalid(format!(
                "{} feature rows but {} label rows",
                x.nrows(),
                y.nrows()
            )));
        }
        let labels = dataset.normalize_labels(y.to_owned())?;
        let scores = ensemble.predict_scores(x)?;
        Ok(ensemble
            .metric()
            .score(ensemble.encoding(), labels.view(), scores.view())?)
    }

    /// Stops any remaining workers and drops the cached datasets.
    pub async fn close(&mut self) {
        self.dispatcher.shutdown().await;
        self.data_manager.clear();
    }

    fn fitted_ensemble(&self) -> AutoMlResult<&Ensemble> {
        match (self.state, &self.ensemble) {
            (RunState::Fitted, Some(ensemble)) => Ok(ensemble),
            (state, _) => Err(AutoMlError::not_fitted(format!(
                "the run is in state {state}"
            ))),
        }
    }

    /// Enters the loading state and records the start time of the run.
    fn begin(&mut self) -> AutoMlResult<Instant> {
        if self.state.is_terminal() {
            return Err(AutoMlError::InvalidState(format!(
                "the run has already ended in state {}",
                self.state
            )));
        }
        if self.state != RunState::Idle {
            return Err(AutoMlError::InvalidState(format!(
                "cannot fit in state {}",
                self.state
            )));
        }
        let started_at = Instant::now();
        self.state = RunState::LoadingData;
        if let Err(e) = self.persist_start_time() {
            error!("failed to start the run: {e}");
            self.state = RunState::Failed;
            return Err(e);
        }
        Ok(started_at)
    }

    fn persist_start_time(&self) -> AutoMlResult<()> {
        self.backend.ensure_internals_directory()?;
        self.backend
            .persist_start_time(self.options.seed, unix_epoch_secs()?)?;
        Ok(())
    }

    async fn fit_dataset(
        &mut self,
        started_at: Instant,
        dataset: AutoMlResult<Arc<DatasetHandle>>,
    ) -> AutoMlResult<()> {
        let dataset_id = dataset
            .as_ref()
            .map(|x| x.dataset_id.clone())
            .unwrap_or_default();
        let span = Span::root("AutoMl::fit", SpanContext::random()).with_properties(|| {
            [
                (SpanAttribute::RUN_SEED, self.options.seed.to_string()),
                (
                    SpanAttribute::RUN_OUTPUT_DIRECTORY,
                    self.options.output_directory.display().to_string(),
                ),
                (SpanAttribute::DATASET_ID, dataset_id),
            ]
        });
        let result = self
            .run(started_at, dataset)
            .in_span(Span::enter_with_parent("AutoMl::run", &span))
            .await;
        record_error(&span, &result);
        match &result {
            Ok(()) => {
                self.state = RunState::Fitted;
                info!(
                    "fit completed in {:.1}s",
                    started_at.elapsed().as_secs_f64()
                );
            }
            Err(e) => {
                error!("fit failed in state {}: {e}", self.state);
                self.state = RunState::Failed;
            }
        }
        result
    }

    async fn run(
        &mut self,
        started_at: Instant,
        dataset: AutoMlResult<Arc<DatasetHandle>>,
    ) -> AutoMlResult<()> {
        let dataset = dataset?;
        let metric = self.resolve_metric(&dataset)?;
        self.backend.persist_data_manager(&dataset)?;
        let time_needed_to_load_data = started_at.elapsed();
        info!(
            "loaded {} ({} rows, {} features) as {} in {:.2}s",
            dataset.dataset_id,
            dataset.n_rows(),
            dataset.n_features(),
            dataset.task,
            time_needed_to_load_data.as_secs_f64()
        );
        self.dataset = Some(Arc::clone(&dataset));

        let baseline = DummyEvaluator::new(self.backend.clone(), metric).evaluate(&dataset)?;
        self.state = RunState::BaselineEvaluated;

        let candidates = self.propose_candidates(dataset.task)?;
        let time_budget = self
            .options
            .time_left_for_this_task
            .saturating_sub(started_at.elapsed());
        self.state = RunState::Searching;
        let request = DispatchRequest {
            backend: self.backend.clone(),
            dataset_id: dataset.dataset_id.clone(),
            metric,
            candidates,
            time_budget,
            concurrency_limit: self.options.concurrency_limit,
            time_needed_to_load_data,
        };
        let message = self.dispatcher.dispatch(request)?.receive().await?;
        let outcomes = message.wait_all().await;
        let completed = outcomes
            .iter()
            .filter(|(_, x)| x.result().is_some_and(|r| r.is_success()))
            .count();
        info!(
            "{completed} of {} candidates completed successfully",
            outcomes.len()
        );

        self.state = RunState::Ensembling;
        let mut results = vec![baseline];
        results.extend(outcomes.iter().filter_map(|(_, x)| x.result().cloned()));
        self.dispatch_summary = outcomes;
        let ensemble = Ensemble::build(
            &self.backend,
            &dataset,
            metric,
            &results,
            self.options.ensemble_size,
        )?;
        self.backend.persist_ensemble(ensemble.record())?;
        self.ensemble = Some(ensemble);
        Ok(())
    }

    fn resolve_metric(&self, dataset: &DatasetHandle) -> AutoMlResult<Metric> {
        let metric = match self.options.metric {
            Some(x) => x,
            None => dataset
                .metric
                .as_deref()
                .and_then(|x| x.parse::<Metric>().ok())
                .filter(|x| x.supports(dataset.task))
                .unwrap_or_else(|| Metric::default_for(dataset.task)),
        };
        if !metric.supports(dataset.task) {
            return Err(AutoMlError::invalid(format!(
                "metric {metric} does not support {}",
                dataset.task
            )));
        }
        Ok(metric)
    }

    fn propose_candidates(&self, task: TaskKind) -> AutoMlResult<Vec<Candidate>> {
        let configurations = ConfigurationSpace::new(task).propose(
            self.options.initial_configurations,
            self.options.max_configurations,
            self.options.seed,
        );
        let mut ids = ConfigurationIdGenerator::new();
        // The first id belongs to the dummy baseline.
        ids.next()?;
        configurations
            .into_iter()
            .map(|configuration| {
                Ok(Candidate {
                    configuration_id: ids.next()?,
                    configuration,
                })
            })
            .collect()
    }
}
