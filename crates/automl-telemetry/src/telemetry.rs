use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use automl_common::config::TelemetryConfig;
use fastrace::collector::{Config, ConsoleReporter, Reporter, SpanRecord};
use log::debug;

use crate::error::{TelemetryError, TelemetryResult};
use crate::loggers::RunLogger;

enum TelemetryStatus {
    Uninitialized,
    Initialized,
    Failed,
    Finalized,
}

static TELEMETRY_STATUS: Mutex<TelemetryStatus> = Mutex::new(TelemetryStatus::Uninitialized);

/// Describes the process that emits the telemetry.
pub struct ResourceOptions {
    /// The process kind, e.g. `controller` or `worker`.
    pub kind: &'static str,
}

pub fn init_telemetry(config: &TelemetryConfig, resource: ResourceOptions) -> TelemetryResult<()> {
    let mut status = TELEMETRY_STATUS
        .lock()
        .map_err(|e| TelemetryError::internal(e.to_string()))?;

    match *status {
        TelemetryStatus::Uninitialized => {
            init_traces(config);
            match init_logs(config, &resource) {
                Ok(()) => {
                    debug!("telemetry initialized for {}", resource.kind);
                    *status = TelemetryStatus::Initialized;
                    Ok(())
                }
                Err(e) => {
                    *status = TelemetryStatus::Failed;
                    Err(e)
                }
            }
        }
        TelemetryStatus::Initialized => {
            Err(TelemetryError::internal("telemetry already initialized"))
        }
        TelemetryStatus::Failed => Err(TelemetryError::internal(
            "telemetry failed to initialize previously",
        )),
        TelemetryStatus::Finalized => Err(TelemetryError::internal(
            "telemetry has been finalized and cannot be re-initialized",
        )),
    }
}

fn init_traces(config: &TelemetryConfig) {
    if config.export_traces {
        let reporter_config = Config::default().report_interval(Duration::from_secs(1));
        fastrace::set_reporter(ConsoleReporter, reporter_config);
    } else {
        let reporter_config = Config::default().report_interval(Duration::MAX);
        fastrace::set_reporter(NoOpReporter, reporter_config);
    }
}

fn init_logs(config: &TelemetryConfig, resource: &ResourceOptions) -> TelemetryResult<()> {
    if config.log_filter.is_empty() {
        return Err(TelemetryError::invalid("empty log filter"));
    }
    let kind = resource.kind;
    let primary = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .format(move |buf, record| {
        let level = record.level();
        let target = record.target();
        let style = buf.default_level_style(level);
        let timestamp = buf.timestamp();
        let args = record.args();
        let pid = std::process::id();
        writeln!(
            buf,
            "[{timestamp} {style}{level}{style:#} {kind}:{pid} {target}] {args}"
        )
    })
    .build();
    let max_level = primary.filter();
    log::set_boxed_logger(Box::new(RunLogger::new(primary, config.export_traces)))
        .map_err(|e| TelemetryError::internal(e.to_string()))?;
    log::set_max_level(max_level);
    Ok(())
}

pub fn shutdown_telemetry() {
    debug!("shutting down telemetry");
    fastrace::flush();
    log::logger().flush();
    if let Ok(mut status) = TELEMETRY_STATUS.lock() {
        if let TelemetryStatus::Initialized = *status {
            *status = TelemetryStatus::Finalized;
        }
    }
}

/// A fastrace reporter that does nothing.
pub struct NoOpReporter;

impl Reporter for NoOpReporter {
    fn report(&mut self, _spans: Vec<SpanRecord>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_telemetry_once() {
        let config = TelemetryConfig {
            log_filter: "debug".to_string(),
            export_traces: false,
        };
        assert!(init_telemetry(&config, ResourceOptions { kind: "test" }).is_ok());
        assert!(matches!(
            init_telemetry(&config, ResourceOptions { kind: "test" }),
            Err(TelemetryError::InternalError(_))
        ));
        shutdown_telemetry();
        assert!(matches!(
            init_telemetry(&config, ResourceOptions { kind: "test" }),
            Err(TelemetryError::InternalError(_))
        ));
    }
}
