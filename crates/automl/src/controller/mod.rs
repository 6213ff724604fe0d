mod core;
mod options;
mod state;

pub use self::core::AutoMl;
pub use options::AutoMlOptions;
pub use state::RunState;
