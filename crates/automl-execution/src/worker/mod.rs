mod entrypoint;
mod task;

pub use entrypoint::run_worker;
pub use task::{WorkerArtifact, WorkerResult, WorkerStatus, WorkerTask};
