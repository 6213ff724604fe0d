use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to fit model: {0}")]
    FitError(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ModelError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ModelError::InvalidArgument(message.into())
    }

    pub fn fit(message: impl Into<String>) -> Self {
        ModelError::FitError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ModelError::InternalError(message.into())
    }
}
