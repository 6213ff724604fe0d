pub mod controller;
pub mod ensemble;
pub mod error;
mod fit;
pub mod runner;
mod worker;
