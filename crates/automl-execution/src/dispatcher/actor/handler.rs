use std::sync::Arc;
use std::time::{Duration, Instant};

use automl_server::actor::ActorContext;
use automl_telemetry::common::SpanAttribute;
use fastrace::collector::SpanContext;
use fastrace::Span;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::dispatcher::actor::{DispatcherActor, QueuedWorker, RunningWorker};
use crate::dispatcher::channel::WorkerOutcome;
use crate::dispatcher::event::{DispatcherEvent, WorkerExit};
use crate::dispatcher::monitor::{WorkerMonitor, WorkerSignal};
use crate::error::ExecutionError;
use crate::id::ConfigurationId;
use crate::worker::{WorkerResult, WorkerTask};
use crate::worker_manager::WorkerLaunchOptions;

const WORKER_SIGNAL_CHANNEL_SIZE: usize = 4;

impl DispatcherActor {
    pub(super) fn handle_launch_workers(&mut self, ctx: &mut ActorContext<Self>) {
        while self.running.len() < self.concurrency_limit {
            let Some(queued) = self.queue.pop_front() else {
                break;
            };
            let remaining = self.remaining();
            if self.budget_expired || remaining.is_zero() || remaining < self.options.min_slice {
                self.queue.push_front(queued);
                self.resolve_not_started();
                break;
            }
            let time_limit = self.options.per_run_time_limit.min(remaining);
            self.launch_worker(ctx, queued, time_limit);
        }
    }

    fn launch_worker(
        &mut self,
        ctx: &mut ActorContext<Self>,
        queued: QueuedWorker,
        time_limit: Duration,
    ) {
        let QueuedWorker { candidate, outcome } = queued;
        let id = candidate.configuration_id;
        let task = WorkerTask {
            configuration_id: id,
            configuration: candidate.configuration.clone(),
            output_directory: self.backend.output_directory().to_path_buf(),
            temp_directory: self.backend.temp_directory().to_path_buf(),
            time_limit_secs: time_limit.as_secs_f64(),
            seed: self.options.seed,
            metric: self.metric,
        };
        // An artifact left by an interrupted run must not be read back as this worker's result.
        let prepared = self
            .backend
            .remove_worker_artifact(id)
            .and_then(|()| self.backend.write_task(&task));
        let task_path = match prepared {
            Ok(x) => x,
            Err(e) => {
                error!("failed to prepare worker {id}: {e}");
                let result = WorkerResult::crashed(
                    id,
                    candidate.configuration,
                    self.backend.worker_artifact_path(id),
                    Duration::ZERO,
                    format!("failed to prepare the worker: {e}"),
                );
                let _ = outcome.send(Some(WorkerOutcome::Completed(result)));
                return;
            }
        };
        let span = Span::enter_with_local_parent("DispatcherActor::launch_worker")
            .with_property(|| (SpanAttribute::WORKER_CONFIGURATION_ID, id.to_string()));
        let options = WorkerLaunchOptions {
            w3c_traceparent: SpanContext::from_span(&span).map(|x| x.encode_w3c_traceparent()),
        };
        let (tx, rx) = mpsc::channel(WORKER_SIGNAL_CHANNEL_SIZE);
        let monitor = WorkerMonitor::new(
            ctx.handle().clone(),
            id,
            Arc::clone(&self.options.worker_manager),
            task_path,
            options,
            rx,
        );
        ctx.spawn(monitor.run());
        ctx.send_with_delay(
            DispatcherEvent::WorkerDeadline {
                configuration_id: id,
            },
            time_limit.saturating_add(self.options.grace_period),
        );
        info!(
            "launched worker {id} for {} with a time limit of {:.1}s",
            candidate.configuration,
            time_limit.as_secs_f64()
        );
        self.running.insert(
            id,
            RunningWorker {
                candidate,
                outcome,
                signals: tx,
                launched_at: Instant::now(),
            },
        );
    }

    pub(super) fn handle_worker_exited(
        &mut self,
        ctx: &mut ActorContext<Self>,
        id: ConfigurationId,
        exit: WorkerExit,
        signalled: bool,
    ) {
        let Some(worker) = self.running.remove(&id) else {
            warn!("unknown worker {id} exited: {exit}");
            return;
        };
        let outcome = if signalled {
            if let Err(e) = self.backend.remove_worker_artifact(id) {
                warn!("failed to remove the artifact of worker {id}: {e}");
            }
            info!("worker {id} was stopped and its result is discarded: {exit}");
            WorkerOutcome::Discarded
        } else {
            let path = self.backend.worker_artifact_path(id);
            let result = match self.backend.load_worker_artifact(id) {
                Ok(artifact) => WorkerResult::from_artifact(&artifact, path),
                Err(ExecutionError::NotFound(_)) => WorkerResult::crashed(
                    id,
                    worker.candidate.configuration.clone(),
                    path,
                    worker.launched_at.elapsed(),
                    format!("worker exited without a result: {exit}"),
                ),
                Err(e) => WorkerResult::crashed(
                    id,
                    worker.candidate.configuration.clone(),
                    path,
                    worker.launched_at.elapsed(),
                    format!("failed to read the worker result: {e}"),
                ),
            };
            match (result.validation_score, &result.message) {
                (Some(score), _) => {
                    info!("worker {id} finished with {} = {score:.4}", self.metric)
                }
                (None, Some(message)) => {
                    info!("worker {id} finished with status {}: {message}", result.status)
                }
                (None, None) => info!("worker {id} finished with status {}", result.status),
            }
            WorkerOutcome::Completed(result)
        };
        if let Err(e) = self.backend.remove_task(id) {
            debug!("failed to remove the task of worker {id}: {e}");
        }
        let _ = worker.outcome.send(Some(outcome));
        self.handle_launch_workers(ctx);
    }

    pub(super) fn handle_worker_deadline(&mut self, id: ConfigurationId) {
        let Some(worker) = self.running.get(&id) else {
            return;
        };
        warn!(
            "worker {id} is still running after {:.1}s and will be killed",
            worker.launched_at.elapsed().as_secs_f64()
        );
        let _ = worker.signals.try_send(WorkerSignal::Kill);
    }

    pub(super) fn handle_budget_expired(&mut self, ctx: &mut ActorContext<Self>) {
        self.budget_expired = true;
        self.resolve_not_started();
        if self.running.is_empty() {
            return;
        }
        info!(
            "time budget expired with {} workers running",
            self.running.len()
        );
        for worker in self.running.values() {
            let _ = worker.signals.try_send(WorkerSignal::Terminate);
        }
        ctx.send_with_delay(DispatcherEvent::KillStragglers, self.options.grace_period);
    }

    pub(super) fn handle_kill_stragglers(&mut self) {
        for (id, worker) in &self.running {
            warn!("killing worker {id} after the grace period");
            let _ = worker.signals.try_send(WorkerSignal::Kill);
        }
    }

    fn resolve_not_started(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        info!(
            "{} candidates were not started within the time budget",
            self.queue.len()
        );
        for worker in self.queue.drain(..) {
            let _ = worker.outcome.send(Some(WorkerOutcome::NotStarted));
        }
    }

    fn remaining(&self) -> Duration {
        self.deadline
            .map(|x| x.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::MAX)
    }
}
