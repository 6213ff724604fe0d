mod entrypoint;

pub use entrypoint::run_worker;
