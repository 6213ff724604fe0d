use std::num::NonZeroUsize;
use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::config::loader::{deserialize_non_empty_string, deserialize_non_zero};
use crate::error::{CommonError, CommonResult};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// The prefix of environment variables that override configuration values.
/// A double underscore separates nested keys, e.g. `AUTOML__RUN__SEED`.
pub const CONFIG_ENV_PREFIX: &str = "AUTOML__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub run: RunConfig,
    pub dispatcher: DispatcherConfig,
    pub worker: WorkerConfig,
    pub search: SearchConfig,
    pub ensemble: EnsembleConfig,
    pub data: DataConfig,
    pub runtime: RuntimeConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> CommonResult<Self> {
        Self::figment()
            .extract()
            .map_err(|e| CommonError::InvalidArgument(e.to_string()))
    }

    /// Loads the configuration with the values in the TOML file taking precedence
    /// over the defaults. Environment variables still take precedence over the file.
    pub fn load_from_file(path: impl AsRef<Path>) -> CommonResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CommonError::invalid(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        Figment::from(Toml::string(DEFAULT_CONFIG))
            .admerge(Toml::file(path))
            .admerge(Self::env())
            .extract()
            .map_err(|e| CommonError::InvalidArgument(e.to_string()))
    }

    fn figment() -> Figment {
        Figment::from(Toml::string(DEFAULT_CONFIG)).admerge(Self::env())
    }

    fn env() -> Env {
        Env::prefixed(CONFIG_ENV_PREFIX).map(|p| p.as_str().replace("__", ".").into())
    }

    pub fn validate(&self) -> CommonResult<()> {
        self.run.validate()?;
        if !(0.0..1.0).contains(&self.data.holdout_fraction) {
            return Err(CommonError::invalid(format!(
                "holdout fraction must be in [0, 1): {}",
                self.data.holdout_fraction
            )));
        }
        if self.ensemble.size == 0 {
            return Err(CommonError::invalid("ensemble size must be positive"));
        }
        Ok(())
    }
}

/// The configuration surface of a single run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub output_directory: String,
    pub temp_directory: String,
    pub time_left_for_this_task: u64,
    pub per_run_time_limit: u64,
    pub seed: u64,
    pub initial_configurations_via_metalearning: usize,
    #[serde(default, deserialize_with = "deserialize_non_zero")]
    pub concurrency_limit: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_non_empty_string")]
    pub metric: Option<String>,
}

impl RunConfig {
    pub const DEFAULT_SEED: u64 = 1;
    pub const DEFAULT_INITIAL_CONFIGURATIONS: usize = 25;

    pub fn new(
        output_directory: impl Into<String>,
        temp_directory: impl Into<String>,
        time_left_for_this_task: u64,
        per_run_time_limit: u64,
    ) -> Self {
        Self {
            output_directory: output_directory.into(),
            temp_directory: temp_directory.into(),
            time_left_for_this_task,
            per_run_time_limit,
            seed: Self::DEFAULT_SEED,
            initial_configurations_via_metalearning: Self::DEFAULT_INITIAL_CONFIGURATIONS,
            concurrency_limit: None,
            metric: None,
        }
    }

    pub fn validate(&self) -> CommonResult<()> {
        if self.output_directory.is_empty() {
            return Err(CommonError::missing("run.output_directory"));
        }
        if self.temp_directory.is_empty() {
            return Err(CommonError::missing("run.temp_directory"));
        }
        if self.time_left_for_this_task == 0 {
            return Err(CommonError::invalid(
                "run.time_left_for_this_task must be positive",
            ));
        }
        if self.per_run_time_limit == 0 {
            return Err(CommonError::invalid("run.per_run_time_limit must be positive"));
        }
        Ok(())
    }

    /// The number of concurrent workers, defaulting to the available core count.
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub min_slice_secs: u64,
    pub grace_period_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default, deserialize_with = "deserialize_non_empty_string")]
    pub program: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_configurations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub holdout_fraction: f64,
    pub split_seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub stack_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_filter: String,
    pub export_traces: bool,
}
