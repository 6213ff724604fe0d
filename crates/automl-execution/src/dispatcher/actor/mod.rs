mod core;
mod handler;

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use automl_models::metric::Metric;
use tokio::sync::{mpsc, oneshot, watch};

use crate::backend::Backend;
use crate::dispatcher::channel::{CompletionMessage, WorkerOutcome};
use crate::dispatcher::monitor::WorkerSignal;
use crate::dispatcher::options::{Candidate, DispatchRequest, DispatcherOptions};
use crate::id::ConfigurationId;

/// Runs the candidates of one dispatch request as worker processes,
/// at most `concurrency_limit` at a time, within the time budget.
pub struct DispatcherActor {
    options: DispatcherOptions,
    backend: Backend,
    dataset_id: String,
    metric: Metric,
    concurrency_limit: usize,
    time_budget: Duration,
    /// `None` when the budget is too large to be represented as an instant.
    deadline: Option<Instant>,
    budget_expired: bool,
    queue: VecDeque<QueuedWorker>,
    running: HashMap<ConfigurationId, RunningWorker>,
    completion: Option<(oneshot::Sender<CompletionMessage>, CompletionMessage)>,
}

pub struct DispatcherSetup {
    pub(in crate::dispatcher) options: DispatcherOptions,
    pub(in crate::dispatcher) request: DispatchRequest,
    pub(in crate::dispatcher) completion: oneshot::Sender<CompletionMessage>,
}

struct QueuedWorker {
    candidate: Candidate,
    outcome: watch::Sender<Option<WorkerOutcome>>,
}

struct RunningWorker {
    candidate: Candidate,
    outcome: watch::Sender<Option<WorkerOutcome>>,
    signals: mpsc::Sender<WorkerSignal>,
    launched_at: Instant,
}
