use std::path::PathBuf;
use std::sync::Arc;

use automl_server::actor::ActorHandle;
use log::{debug, warn};
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::dispatcher::actor::DispatcherActor;
use crate::dispatcher::event::{DispatcherEvent, WorkerExit};
use crate::id::ConfigurationId;
use crate::worker_manager::{WorkerLaunchOptions, WorkerManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WorkerSignal {
    /// Asks the worker to exit.
    Terminate,
    Kill,
}

/// Launches one worker process and reports its exit to the dispatcher.
pub(super) struct WorkerMonitor {
    handle: ActorHandle<DispatcherActor>,
    configuration_id: ConfigurationId,
    worker_manager: Arc<dyn WorkerManager>,
    task_path: PathBuf,
    options: WorkerLaunchOptions,
    signals: mpsc::Receiver<WorkerSignal>,
}

impl WorkerMonitor {
    pub fn new(
        handle: ActorHandle<DispatcherActor>,
        configuration_id: ConfigurationId,
        worker_manager: Arc<dyn WorkerManager>,
        task_path: PathBuf,
        options: WorkerLaunchOptions,
        signals: mpsc::Receiver<WorkerSignal>,
    ) -> Self {
        Self {
            handle,
            configuration_id,
            worker_manager,
            task_path,
            options,
            signals,
        }
    }

    pub async fn run(self) {
        let Self {
            handle,
            configuration_id,
            worker_manager,
            task_path,
            options,
            mut signals,
        } = self;
        let (exit, signalled) = match worker_manager
            .launch_worker(configuration_id, &task_path, options)
            .await
        {
            Ok(child) => Self::watch(configuration_id, child, &mut signals).await,
            Err(e) => (WorkerExit::LaunchFailed(e.to_string()), false),
        };
        let event = DispatcherEvent::WorkerExited {
            configuration_id,
            exit,
            signalled,
        };
        if handle.send(event).await.is_err() {
            debug!("dispatcher stopped before worker {configuration_id} was reported");
        }
    }

    async fn watch(
        configuration_id: ConfigurationId,
        mut child: Child,
        signals: &mut mpsc::Receiver<WorkerSignal>,
    ) -> (WorkerExit, bool) {
        let mut signalled = false;
        let mut listening = true;
        loop {
            tokio::select! {
                status = child.wait() => {
                    let exit = match status {
                        Ok(status) => WorkerExit::Exited(status),
                        Err(e) => WorkerExit::WaitFailed(e.to_string()),
                    };
                    return (exit, signalled);
                }
                signal = signals.recv(), if listening => match signal {
                    Some(WorkerSignal::Terminate) => {
                        debug!("terminating worker {configuration_id}");
                        signalled = true;
                        terminate(&mut child);
                    }
                    Some(WorkerSignal::Kill) => {
                        debug!("killing worker {configuration_id}");
                        signalled = true;
                        if let Err(e) = child.start_kill() {
                            warn!("failed to kill worker {configuration_id}: {e}");
                        }
                    }
                    None => listening = false,
                },
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: the process is a child of ours that has not been reaped yet.
        let _ = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}
