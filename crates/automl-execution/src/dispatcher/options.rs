use std::sync::Arc;
use std::time::Duration;

use automl_common::config::AppConfig;
use automl_models::configuration::Configuration;
use automl_models::metric::Metric;

use crate::backend::Backend;
use crate::id::ConfigurationId;
use crate::worker_manager::WorkerManager;

#[readonly::make]
#[derive(Clone)]
pub struct DispatcherOptions {
    pub per_run_time_limit: Duration,
    /// Candidates are not started once less than this much of the budget remains.
    pub min_slice: Duration,
    /// The time between asking a worker to terminate and killing it.
    pub grace_period: Duration,
    pub seed: u64,
    pub worker_manager: Arc<dyn WorkerManager>,
}

impl DispatcherOptions {
    pub fn new(config: &AppConfig, worker_manager: Arc<dyn WorkerManager>) -> Self {
        Self {
            per_run_time_limit: Duration::from_secs(config.run.per_run_time_limit),
            min_slice: Duration::from_secs(config.dispatcher.min_slice_secs),
            grace_period: Duration::from_secs(config.dispatcher.grace_period_secs),
            seed: config.run.seed,
            worker_manager,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub configuration_id: ConfigurationId,
    pub configuration: Configuration,
}

/// A batch of candidates to evaluate within a time budget.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub backend: Backend,
    pub dataset_id: String,
    pub metric: Metric,
    pub candidates: Vec<Candidate>,
    pub time_budget: Duration,
    pub concurrency_limit: usize,
    pub time_needed_to_load_data: Duration,
}
