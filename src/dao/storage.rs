use std::error::Error;
use thiserror::Error;

/// Result alias for question store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by question store backends regardless of the medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing medium could not be read.
    #[error("question store unavailable: {message}")]
    Unavailable {
        /// Human-readable description of what failed.
        message: String,
        /// Underlying backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backing medium was read but its content is not a valid bank.
    #[error("question store corrupt: {message}")]
    Corrupt {
        /// Human-readable description of the offending content.
        message: String,
        /// Underlying decode failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corrupt-content error from a decode failure.
    pub fn corrupt(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Corrupt {
            message,
            source: Box::new(source),
        }
    }
}
