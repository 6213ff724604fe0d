use std::sync::PoisonError;

use automl_common::error::CommonError;
use automl_data::error::DataError;
use automl_models::error::ModelError;
use thiserror::Error;
use tokio::task::JoinError;

pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("directory error: {0}")]
    DirectoryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    DataError(#[from] DataError),
    #[error(transparent)]
    ModelError(#[from] ModelError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ExecutionError {
    pub fn directory(message: impl Into<String>) -> Self {
        ExecutionError::DirectoryError(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ExecutionError::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ExecutionError::InvalidArgument(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ExecutionError::InternalError(message.into())
    }
}

impl From<CommonError> for ExecutionError {
    fn from(error: CommonError) -> Self {
        match error {
            CommonError::MissingArgument(message)
            | CommonError::InvalidArgument(message) => ExecutionError::InvalidArgument(message),
            CommonError::InternalError(message) => ExecutionError::InternalError(message),
        }
    }
}

impl From<JoinError> for ExecutionError {
    fn from(error: JoinError) -> Self {
        ExecutionError::InternalError(error.to_string())
    }
}

impl<T> From<PoisonError<T>> for ExecutionError {
    fn from(error: PoisonError<T>) -> Self {
        ExecutionError::InternalError(error.to_string())
    }
}
