use std::path::{Path, PathBuf};

use automl_common::config::AppConfig;
use automl_common::runtime::RuntimeManager;
use automl_telemetry::telemetry::{init_telemetry, shutdown_telemetry, ResourceOptions};
use log::warn;

use crate::controller::AutoMl;

#[derive(Debug, clap::Args)]
pub struct FitArgs {
    /// A dataset directory or a comma-separated file with the label in the last column
    #[arg(long)]
    pub dataset: PathBuf,
    /// The run output directory
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// The directory for worker task files (defaults to `<output>/.tmp`)
    #[arg(long)]
    pub temp: Option<PathBuf>,
    /// The time budget of the run in seconds
    #[arg(long)]
    pub time_left: Option<u64>,
    /// The time limit of a single candidate evaluation in seconds
    #[arg(long)]
    pub per_run: Option<u64>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// The maximum number of concurrent workers
    #[arg(long)]
    pub concurrency: Option<usize>,
    #[arg(long)]
    pub metric: Option<String>,
    /// A TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl FitArgs {
    fn apply(&self, config: &mut AppConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(output) = &self.output {
            config.run.output_directory = output.display().to_string();
        }
        if let Some(temp) = &self.temp {
            config.run.temp_directory = temp.display().to_string();
        } else if config.run.temp_directory.is_empty() && !config.run.output_directory.is_empty() {
            config.run.temp_directory = Path::new(&config.run.output_directory)
                .join(".tmp")
                .display()
                .to_string();
        }
        if let Some(time_left) = self.time_left {
            config.run.time_left_for_this_task = time_left;
        }
        if let Some(per_run) = self.per_run {
            config.run.per_run_time_limit = per_run;
        }
        if let Some(seed) = self.seed {
            config.run.seed = seed;
        }
        if let Some(concurrency) = self.concurrency {
            config.run.concurrency_limit = Some(concurrency).filter(|x| *x > 0);
        }
        if let Some(metric) = &self.metric {
            config.run.metric = Some(metric.clone());
        }
        if config.worker.program.is_none() {
            config.worker.program = Some(std::env::current_exe()?.display().to_string());
            config.worker.args = vec!["worker".to_string()];
        }
        Ok(())
    }
}

pub fn run_fit(args: FitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load()?,
    };
    args.apply(&mut config)?;
    let runtime = RuntimeManager::try_new(&config.runtime)?;

    init_telemetry(&config.telemetry, ResourceOptions { kind: "controller" })?;

    let mut automl = AutoMl::new(config)?;
    let result = runtime.block_on(async {
        let result = automl.fit_from_dataset_path(&args.dataset).await;
        automl.close().await;
        result
    });

    if result.is_ok() {
        print_summary(&automl);
    }

    shutdown_telemetry();

    result?;
    Ok(())
}

fn print_summary(automl: &AutoMl) {
    let (Some(dataset), Some(ensemble)) = (automl.dataset(), automl.ensemble()) else {
        return;
    };
    println!("dataset: {}", dataset.dataset_id);
    println!("task: {}", dataset.task);
    println!(
        "holdout {}: {:.4}",
        ensemble.metric(),
        ensemble.validation_score()
    );
    println!("ensemble:");
    for member in ensemble.members() {
        println!(
            "  {:>6.3} {} {}",
            member.weight, member.configuration_id, member.configuration
        );
    }
    if let (Some(x), Some(y)) = (&dataset.x_test, &dataset.y_test) {
        if x.nrows() > 0 {
            match automl.score(x.view(), y.view()) {
                Ok(score) => println!("test {}: {score:.4}", ensemble.metric()),
                Err(e) => warn!("failed to score the test data: {e}"),
            }
        }
    }
}
