use std::path::PathBuf;
use std::time::Duration;

use automl_models::configuration::Configuration;
use tokio::sync::{oneshot, watch};

use crate::dispatcher::options::Candidate;
use crate::error::{ExecutionError, ExecutionResult};
use crate::id::ConfigurationId;
use crate::worker::WorkerResult;

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// The worker exited on its own and its artifact was read back.
    Completed(WorkerResult),
    /// The dispatcher stopped the worker and removed any artifact it left.
    Discarded,
    /// The budget ran out before the worker could be launched.
    NotStarted,
}

impl WorkerOutcome {
    pub fn result(&self) -> Option<&WorkerResult> {
        match self {
            WorkerOutcome::Completed(result) => Some(result),
            WorkerOutcome::Discarded | WorkerOutcome::NotStarted => None,
        }
    }
}

/// Observes the outcome of one dispatched candidate.
pub struct WorkerHandle {
    candidate: Candidate,
    outcome: watch::Receiver<Option<WorkerOutcome>>,
}

impl WorkerHandle {
    pub(super) fn new(
        candidate: Candidate,
        outcome: watch::Receiver<Option<WorkerOutcome>>,
    ) -> Self {
        Self { candidate, outcome }
    }

    pub fn configuration_id(&self) -> ConfigurationId {
        self.candidate.configuration_id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.candidate.configuration
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn try_outcome(&self) -> Option<WorkerOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits until the worker has an outcome.
    pub async fn wait(&mut self) -> WorkerOutcome {
        let outcome = match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        // The dispatcher resolves every handle before it stops,
        // so a missing outcome means the dispatcher has gone away.
        outcome
            .or_else(|| self.try_outcome())
            .unwrap_or(WorkerOutcome::Discarded)
    }
}

/// What the dispatcher reports once every candidate has a handle.
pub struct CompletionMessage {
    pub time_needed_to_load_data: Duration,
    pub data_manager_path: PathBuf,
    pub workers: Vec<WorkerHandle>,
}

impl CompletionMessage {
    /// Waits for all workers in dispatch order.
    pub async fn wait_all(self) -> Vec<(Candidate, WorkerOutcome)> {
        let mut out = Vec::with_capacity(self.workers.len());
        for mut worker in self.workers {
            let outcome = worker.wait().await;
            out.push((worker.candidate, outcome));
        }
        out
    }
}

pub struct CompletionChannel {
    receiver: oneshot::Receiver<CompletionMessage>,
}

impl CompletionChannel {
    pub(super) fn new(receiver: oneshot::Receiver<CompletionMessage>) -> Self {
        Self { receiver }
    }

    pub async fn receive(self) -> ExecutionResult<CompletionMessage> {
        self.receiver.await.map_err(|_| {
            ExecutionError::internal("the dispatcher stopped before reporting its workers")
        })
    }

    /// Receives the message from synchronous code outside the async runtime.
    pub fn blocking_receive(self) -> ExecutionResult<CompletionMessage> {
        self.receiver.blocking_recv().map_err(|_| {
            ExecutionError::internal("the dispatcher stopped before reporting its workers")
        })
    }
}
