use std::collections::HashSet;

use automl_server::actor::{ActorHandle, ActorSystem};
use log::debug;
use tokio::sync::oneshot;

use crate::dispatcher::actor::{DispatcherActor, DispatcherSetup};
use crate::dispatcher::channel::CompletionChannel;
use crate::dispatcher::event::DispatcherEvent;
use crate::dispatcher::options::{DispatchRequest, DispatcherOptions};
use crate::error::{ExecutionError, ExecutionResult};

/// Evaluates batches of candidate configurations in worker processes.
///
/// Each call to [`RunDispatcher::dispatch`] starts an actor that owns the
/// workers of the batch. The actor stops once every candidate has an outcome.
pub struct RunDispatcher {
    options: DispatcherOptions,
    system: ActorSystem,
    handles: Vec<ActorHandle<DispatcherActor>>,
}

impl RunDispatcher {
    pub fn new(options: DispatcherOptions) -> Self {
        Self {
            options,
            system: ActorSystem::new(),
            handles: vec![],
        }
    }

    /// Starts evaluating the candidates and returns a channel that delivers
    /// one handle per candidate. This must be called within a Tokio runtime.
    pub fn dispatch(&mut self, request: DispatchRequest) -> ExecutionResult<CompletionChannel> {
        let data_manager = request.backend.data_manager_path();
        if !data_manager.is_file() {
            return Err(ExecutionError::not_found(format!(
                "the dataset must be persisted before dispatch: {}",
                data_manager.display()
            )));
        }
        let mut seen = HashSet::new();
        for candidate in &request.candidates {
            if candidate.configuration_id.is_dummy() {
                return Err(ExecutionError::invalid(
                    "the baseline configuration id cannot be dispatched",
                ));
            }
            if !seen.insert(candidate.configuration_id) {
                return Err(ExecutionError::invalid(format!(
                    "duplicate configuration id: {}",
                    candidate.configuration_id
                )));
            }
        }
        let (tx, rx) = oneshot::channel();
        let handle = self.system.spawn::<DispatcherActor>(DispatcherSetup {
            options: self.options.clone(),
            request,
            completion: tx,
        });
        self.handles.retain(|x| !x.is_stopped());
        self.handles.push(handle);
        Ok(CompletionChannel::new(rx))
    }

    /// Stops all dispatches. Running workers are killed and their outcomes are discarded.
    pub async fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.send(DispatcherEvent::Shutdown).await.is_err() {
                debug!("dispatcher already stopped");
            }
        }
        self.system.join().await;
    }

    /// Waits for all dispatches to finish.
    pub async fn join(&mut self) {
        self.system.join().await;
        self.handles.clear();
    }
}
