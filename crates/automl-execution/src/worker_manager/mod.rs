mod options;
mod process;

use std::path::Path;

pub use options::WorkerLaunchOptions;
pub use process::ProcessWorkerManager;
use tokio::process::Child;

use crate::error::ExecutionResult;
use crate::id::ConfigurationId;

#[async_trait::async_trait]
pub trait WorkerManager: Send + Sync + 'static {
    /// Launches a worker process that runs the task in the file.
    /// The returned child is killed when dropped.
    async fn launch_worker(
        &self,
        id: ConfigurationId,
        task_path: &Path,
        options: WorkerLaunchOptions,
    ) -> ExecutionResult<Child>;
}
