use std::borrow::Cow;
use std::fmt;
use std::process::ExitStatus;

use automl_telemetry::common::{SpanAssociation, SpanAttribute};

use crate::id::ConfigurationId;

pub enum DispatcherEvent {
    LaunchWorkers,
    WorkerExited {
        configuration_id: ConfigurationId,
        exit: WorkerExit,
        /// Whether the dispatcher signalled the worker before it exited.
        signalled: bool,
    },
    WorkerDeadline {
        configuration_id: ConfigurationId,
    },
    BudgetExpired,
    KillStragglers,
    Shutdown,
}

/// How a worker process ended, as observed by its monitor.
#[derive(Debug, Clone)]
pub enum WorkerExit {
    Exited(ExitStatus),
    WaitFailed(String),
    LaunchFailed(String),
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Exited(status) => write!(f, "{status}"),
            WorkerExit::WaitFailed(message) => write!(f, "failed to wait for worker: {message}"),
            WorkerExit::LaunchFailed(message) => write!(f, "{message}"),
        }
    }
}

impl SpanAssociation for DispatcherEvent {
    fn name(&self) -> Cow<'static, str> {
        let name = match self {
            DispatcherEvent::LaunchWorkers => "LaunchWorkers",
            DispatcherEvent::WorkerExited { .. } => "WorkerExited",
            DispatcherEvent::WorkerDeadline { .. } => "WorkerDeadline",
            DispatcherEvent::BudgetExpired => "BudgetExpired",
            DispatcherEvent::KillStragglers => "KillStragglers",
            DispatcherEvent::Shutdown => "Shutdown",
        };
        name.into()
    }

    fn properties(&self) -> impl IntoIterator<Item = (Cow<'static, str>, Cow<'static, str>)> {
        let mut p: Vec<(&'static str, String)> = vec![];
        match self {
            DispatcherEvent::WorkerExited {
                configuration_id,
                exit,
                signalled: _,
            } => {
                p.push((
                    SpanAttribute::WORKER_CONFIGURATION_ID,
                    configuration_id.to_string(),
                ));
                p.push((SpanAttribute::WORKER_EXIT, exit.to_string()));
            }
            DispatcherEvent::WorkerDeadline { configuration_id } => {
                p.push((
                    SpanAttribute::WORKER_CONFIGURATION_ID,
                    configuration_id.to_string(),
                ));
            }
            DispatcherEvent::LaunchWorkers
            | DispatcherEvent::BudgetExpired
            | DispatcherEvent::KillStragglers
            | DispatcherEvent::Shutdown => {}
        }
        p.into_iter().map(|(k, v)| (k.into(), v.into()))
    }
}
