pub mod error;
pub mod format;
pub mod handle;
pub mod manager;
pub mod split;
pub mod target;
pub mod task;
