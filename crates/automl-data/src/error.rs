use automl_common::error::CommonError;
use thiserror::Error;

pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset format error: {0}")]
    DatasetFormat(String),
    #[error("dataset is empty: {0}")]
    DatasetEmpty(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl DataError {
    pub fn format(message: impl Into<String>) -> Self {
        DataError::DatasetFormat(message.into())
    }

    pub fn empty(message: impl Into<String>) -> Self {
        DataError::DatasetEmpty(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        DataError::InvalidArgument(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DataError::InternalError(message.into())
    }
}

impl From<CommonError> for DataError {
    fn from(error: CommonError) -> Self {
        match error {
            CommonError::MissingArgument(message)
            | CommonError::InvalidArgument(message) => DataError::InvalidArgument(message),
            CommonError::InternalError(message) => DataError::InternalError(message),
        }
    }
}
