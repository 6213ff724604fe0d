use std::path::{Path, PathBuf};
use std::process::Stdio;

use automl_common::config::WorkerConfig;
use automl_telemetry::common::ContextPropagationEnv;
use log::debug;
use tokio::process::{Child, Command};

use crate::error::{ExecutionError, ExecutionResult};
use crate::id::ConfigurationId;
use crate::worker_manager::{WorkerLaunchOptions, WorkerManager};

/// Launches each worker as `<program> <args...> --task <path>`.
#[derive(Debug, Clone)]
pub struct ProcessWorkerManager {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessWorkerManager {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn try_from_config(config: &WorkerConfig) -> ExecutionResult<Self> {
        let program = config
            .program
            .as_ref()
            .ok_or_else(|| ExecutionError::invalid("missing worker program"))?;
        Ok(Self::new(program, config.args.clone()))
    }
}

#[async_trait::async_trait]
impl WorkerManager for ProcessWorkerManager {
    async fn launch_worker(
        &self,
        id: ConfigurationId,
        task_path: &Path,
        options: WorkerLaunchOptions,
    ) -> ExecutionResult<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--task")
            .arg(task_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(traceparent) = options.w3c_traceparent {
            command.env(ContextPropagationEnv::TRACEPARENT, traceparent);
        }
        let child = command.spawn().map_err(|e| {
            ExecutionError::internal(format!(
                "failed to launch worker {id} with {}: {e}",
                self.program.display()
            ))
        })?;
        debug!("launched worker {id} as process {:?}", child.id());
        Ok(child)
    }
}
