use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use automl_server::actor::{Actor, ActorAction, ActorContext};
use automl_telemetry::common::SpanAssociation;
use fastrace::collector::SpanContext;
use fastrace::Span;
use log::{info, warn};
use tokio::sync::watch;

use crate::dispatcher::actor::{DispatcherActor, DispatcherSetup, QueuedWorker};
use crate::dispatcher::channel::{CompletionMessage, WorkerHandle, WorkerOutcome};
use crate::dispatcher::event::DispatcherEvent;

impl Actor for DispatcherActor {
    type Message = DispatcherEvent;
    type Options = DispatcherSetup;

    fn new(setup: DispatcherSetup) -> Self {
        let DispatcherSetup {
            options,
            request,
            completion,
        } = setup;
        let mut queue = VecDeque::with_capacity(request.candidates.len());
        let mut workers = Vec::with_capacity(request.candidates.len());
        for candidate in request.candidates {
            let (tx, rx) = watch::channel(None);
            workers.push(WorkerHandle::new(candidate.clone(), rx));
            queue.push_back(QueuedWorker {
                candidate,
                outcome: tx,
            });
        }
        let message = CompletionMessage {
            time_needed_to_load_data: request.time_needed_to_load_data,
            data_manager_path: request.backend.data_manager_path(),
            workers,
        };
        Self {
            options,
            backend: request.backend,
            dataset_id: request.dataset_id,
            metric: request.metric,
            concurrency_limit: request.concurrency_limit.max(1),
            time_budget: request.time_budget,
            deadline: Instant::now().checked_add(request.time_budget),
            budget_expired: false,
            queue,
            running: HashMap::new(),
            completion: Some((completion, message)),
        }
    }

    fn start(&mut self, ctx: &mut ActorContext<Self>) {
        info!(
            "dispatching {} candidates for {} with a budget of {:.1}s and up to {} workers",
            self.queue.len(),
            self.dataset_id,
            self.time_budget.as_secs_f64(),
            self.concurrency_limit
        );
        if let Some((sender, message)) = self.completion.take() {
            if sender.send(message).is_err() {
                warn!("the dispatch for {} is no longer observed", self.dataset_id);
            }
        }
        ctx.send_with_delay(DispatcherEvent::BudgetExpired, self.time_budget);
        ctx.send(DispatcherEvent::LaunchWorkers);
    }

    fn receive(&mut self, ctx: &mut ActorContext<Self>, message: DispatcherEvent) -> ActorAction {
        let span = Span::root(message.name(), SpanContext::random())
            .with_properties(|| message.properties());
        let _guard = span.set_local_parent();
        match message {
            DispatcherEvent::LaunchWorkers => self.handle_launch_workers(ctx),
            DispatcherEvent::WorkerExited {
                configuration_id,
                exit,
                signalled,
            } => self.handle_worker_exited(ctx, configuration_id, exit, signalled),
            DispatcherEvent::WorkerDeadline { configuration_id } => {
                self.handle_worker_deadline(configuration_id)
            }
            DispatcherEvent::BudgetExpired => self.handle_budget_expired(ctx),
            DispatcherEvent::KillStragglers => self.handle_kill_stragglers(),
            DispatcherEvent::Shutdown => return ActorAction::Stop,
        }
        if self.queue.is_empty() && self.running.is_empty() {
            ActorAction::Stop
        } else {
            ActorAction::Continue
        }
    }

    fn stop(mut self, _: &mut ActorContext<Self>) {
        // Monitors are aborted when the context is dropped, which kills their workers.
        for (id, worker) in self.running.drain() {
            if let Err(e) = self.backend.remove_worker_artifact(id) {
                warn!("failed to remove the artifact of worker {id}: {e}");
            }
            let _ = self.backend.remove_task(id);
            let _ = worker.outcome.send(Some(WorkerOutcome::Discarded));
        }
        for worker in self.queue.drain(..) {
            let _ = worker.outcome.send(Some(WorkerOutcome::NotStarted));
        }
        info!("dispatcher for {} stopped", self.dataset_id);
    }
}
