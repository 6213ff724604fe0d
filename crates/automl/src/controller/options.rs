use std::path::PathBuf;
use std::time::Duration;

use automl_common::config::AppConfig;
use automl_data::split::SplitOptions;
use automl_models::metric::Metric;

use crate::error::AutoMlResult;

#[readonly::make]
#[derive(Debug, Clone)]
pub struct AutoMlOptions {
    pub output_directory: PathBuf,
    pub temp_directory: PathBuf,
    pub time_left_for_this_task: Duration,
    pub seed: u64,
    pub initial_configurations: usize,
    pub max_configurations: usize,
    pub concurrency_limit: usize,
    /// The metric to optimize. The task default is used when unset.
    pub metric: Option<Metric>,
    pub ensemble_size: usize,
    pub split: SplitOptions,
}

impl AutoMlOptions {
    pub fn try_new(config: &AppConfig) -> AutoMlResult<Self> {
        config.validate()?;
        let metric = config
            .run
            .metric
            .as_deref()
            .map(str::parse::<Metric>)
            .transpose()?;
        Ok(Self {
            output_directory: PathBuf::from(&config.run.output_directory),
            temp_directory: PathBuf::from(&config.run.temp_directory),
            time_left_for_this_task: Duration::from_secs(config.run.time_left_for_this_task),
            seed: config.run.seed,
            initial_configurations: config.run.initial_configurations_via_metalearning,
            max_configurations: config.search.max_configurations,
            concurrency_limit: config.run.concurrency_limit(),
            metric,
            ensemble_size: config.ensemble.size,
            split: SplitOptions {
                holdout_fraction: config.data.holdout_fraction,
                split_seed: config.data.split_seed,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use automl_common::config::RunConfig;

    use super::*;
    use crate::error::AutoMlError;

    fn config() -> AppConfig {
        let mut config = AppConfig::load().unwrap();
        config.run = RunConfig::new("/tmp/automl/output", "/tmp/automl/tmp", 30, 10);
        config
    }

    #[test]
    fn test_options_from_config() {
        let mut config = config();
        config.run.concurrency_limit = Some(2);
        config.run.metric = Some("bac_metric".to_string());
        let options = AutoMlOptions::try_new(&config).unwrap();
        assert_eq!(options.time_left_for_this_task, Duration::from_secs(30));
        assert_eq!(options.concurrency_limit, 2);
        assert_eq!(options.metric, Some(Metric::BalancedAccuracy));
        assert_eq!(options.seed, RunConfig::DEFAULT_SEED);
        assert_eq!(options.output_directory, PathBuf::from("/tmp/automl/output"));
    }

    #[test]
    fn test_options_reject_invalid_config() {
        let mut config = config();
        config.run.per_run_time_limit = 0;
        assert!(matches!(
            AutoMlOptions::try_new(&config),
            Err(AutoMlError::InvalidArgument(_))
        ));

        let mut config = self::config();
        config.data.holdout_fraction = 1.0;
        assert!(AutoMlOptions::try_new(&config).is_err());

        let mut config = self::config();
        config.run.metric = Some("log_loss".to_string());
        assert!(AutoMlOptions::try_new(&config).is_err());
    }
}
