//! Errors reported by storage backends.

use thiserror::Error;

/// Errors that can occur while listing or retrieving objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage service answered with a non-success status code.
    #[error("storage service responded with status {status}: {message}")]
    Status {
        /// The HTTP status code reported by the service.
        status: u16,
        /// The response body or a short description of the failure.
        message: String,
    },

    /// IO errors related to payload streaming.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error stemming from the storage client, for example connection failures.
    #[error("storage backend error: {context}")]
    Generic {
        /// What the backend was doing when the error occurred.
        context: String,
        /// The underlying error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Creates a [`StorageError::Generic`] with the given context.
    pub fn generic<E>(context: impl Into<String>, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Generic {
            context: context.into(),
            cause: cause.into(),
        }
    }

    /// Returns the status code reported by the storage service, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Io(_) | Self::Generic { .. } => None,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
