use std::path::Path;

use automl_common::config::AppConfig;
use automl_telemetry::telemetry::{init_telemetry, shutdown_telemetry, ResourceOptions};
use log::debug;

/// Evaluates the task and returns once its artifact has been written.
/// A timed-out fit may still be running on another thread and ends with the process.
pub fn run_worker(task: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_telemetry(&config.telemetry, ResourceOptions { kind: "worker" })?;

    let status = automl_execution::run_worker(task);
    if let Ok(status) = &status {
        debug!("worker finished with status {status}");
    }

    shutdown_telemetry();

    status?;
    Ok(())
}
