mod entrypoint;

pub use entrypoint::{run_fit, FitArgs};
