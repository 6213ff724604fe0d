use clap::{Parser, Subcommand};

use crate::fit::{run_fit, FitArgs};
use crate::worker::run_worker;

#[derive(Parser)]
#[command(version, name = "automl")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fits a dataset within a time budget and prints the resulting ensemble
    Fit(FitArgs),
    /// Evaluates one candidate configuration (launched by the dispatcher)
    Worker {
        /// The task file written by the dispatcher
        #[arg(long)]
        task: std::path::PathBuf,
    },
}

pub fn main(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(args);

    match cli.command {
        Command::Fit(args) => run_fit(args),
        Command::Worker { task } => run_worker(&task),
    }
}
