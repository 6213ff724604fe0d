pub mod configuration;
pub mod error;
pub mod estimator;
mod linalg;
pub mod metric;
pub mod preprocessing;
pub mod space;
