pub mod common;
pub mod error;
mod loggers;
pub mod recorder;
pub mod telemetry;
