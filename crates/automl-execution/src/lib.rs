pub mod backend;
pub mod dispatcher;
pub mod dummy;
pub mod error;
pub mod id;
pub mod worker;
pub mod worker_manager;

pub use worker::run_worker;
