use std::fmt;

/// The lifecycle of a run. `Fitted` and `Failed` are terminal.
///
/// A run fails from `LoadingData` when the data or the run directory is
/// unusable, and from `Searching` when dispatching fails. It also fails from
/// `Ensembling` when the ensemble cannot be built or persisted, e.g. when the
/// baseline artifact has been removed from the run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LoadingData,
    BaselineEvaluated,
    Searching,
    Ensembling,
    Fitted,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Fitted | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::LoadingData => "loading_data",
            RunState::BaselineEvaluated => "baseline_evaluated",
            RunState::Searching => "searching",
            RunState::Ensembling => "ensembling",
            RunState::Fitted => "fitted",
            RunState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}
