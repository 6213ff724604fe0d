use automl_common::error::CommonError;
use automl_data::error::DataError;
use automl_execution::error::ExecutionError;
use automl_models::error::ModelError;
use thiserror::Error;

pub type AutoMlResult<T> = Result<T, AutoMlError>;

/// The errors a run surfaces to the caller.
///
/// Failures of individual candidates are not errors. They are recorded
/// in the worker results and excluded from the ensemble.
#[derive(Debug, Error)]
pub enum AutoMlError {
    #[error("directory error: {0}")]
    DirectoryError(String),
    #[error("dataset format error: {0}")]
    DatasetFormatError(String),
    #[error("dataset is empty: {0}")]
    DatasetEmptyError(String),
    #[error("not fitted: {0}")]
    NotFittedError(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AutoMlError {
    pub fn not_fitted(message: impl Into<String>) -> Self {
        AutoMlError::NotFittedError(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AutoMlError::InvalidArgument(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AutoMlError::InternalError(message.into())
    }
}

impl From<CommonError> for AutoMlError {
    fn from(error: CommonError) -> Self {
        match error {
            CommonError::MissingArgument(message)
            | CommonError::InvalidArgument(message) => AutoMlError::InvalidArgument(message),
            CommonError::InternalError(message) => AutoMlError::InternalError(message),
        }
    }
}

impl From<DataError> for AutoMlError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::DatasetFormat(message) => AutoMlError::DatasetFormatError(message),
            DataError::DatasetEmpty(message) => AutoMlError::DatasetEmptyError(message),
            DataError::InvalidArgument(message) => AutoMlError::InvalidArgument(message),
            DataError::IoError(e) => AutoMlError::DatasetFormatError(e.to_string()),
            DataError::InternalError(message) => AutoMlError::InternalError(message),
        }
    }
}

impl From<ModelError> for AutoMlError {
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::InvalidArgument(message) => AutoMlError::InvalidArgument(message),
            ModelError::FitError(message) | ModelError::InternalError(message) => {
                AutoMlError::InternalError(message)
            }
        }
    }
}

impl From<ExecutionError> for AutoMlError {
    fn from(error: ExecutionError) -> Self {
        match error {
            ExecutionError::DirectoryError(message) => AutoMlError::DirectoryError(message),
            ExecutionError::InvalidState(message) => AutoMlError::InvalidState(message),
            ExecutionError::InvalidArgument(message) => AutoMlError::InvalidArgument(message),
            ExecutionError::DataError(e) => e.into(),
            ExecutionError::ModelError(e) => e.into(),
            ExecutionError::NotFound(message) | ExecutionError::InternalError(message) => {
                AutoMlError::InternalError(message)
            }
            ExecutionError::IoError(e) => AutoMlError::InternalError(e.to_string()),
            ExecutionError::JsonError(e) => AutoMlError::InternalError(e.to_string()),
        }
    }
}
