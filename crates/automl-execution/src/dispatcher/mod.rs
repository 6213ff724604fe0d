mod actor;
mod channel;
mod event;
mod monitor;
mod options;
mod run;

pub use channel::{CompletionChannel, CompletionMessage, WorkerHandle, WorkerOutcome};
pub use event::WorkerExit;
pub use options::{Candidate, DispatchRequest, DispatcherOptions};
pub use run::RunDispatcher;
