use thiserror::Error;
use uuid::Uuid;

use crate::dispatch::DispatchError;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Cassandra error: {0}")]
    Cassandra(String),

    #[cfg(feature = "mongo")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(Uuid),

    #[error("No record for index {0}")]
    IndexOutOfRange(u64),

    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Short label for the error class, used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            BenchError::Dispatch(_) => "dispatch",
            BenchError::Cassandra(_) => "cassandra",
            #[cfg(feature = "mongo")]
            BenchError::Mongo(_) => "mongo",
            BenchError::DuplicateKey(_) => "duplicate_key",
            BenchError::IndexOutOfRange(_) => "index_out_of_range",
            BenchError::BackendUnavailable(_) => "backend_unavailable",
            BenchError::InvalidConfig(_) => "invalid_config",
        }
    }
}
