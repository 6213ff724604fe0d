mod application;
mod loader;

pub use application::*;
pub use loader::{deserialize_non_empty_string, deserialize_non_zero};
