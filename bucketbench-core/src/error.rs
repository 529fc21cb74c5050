use bucketbench_service::StorageError;
use thiserror::Error;

/// Errors that abort a benchmark run.
///
/// Failures of individual retrievals are not errors at this level. They are recorded as
/// samples and only show up in the status histogram of the report.
#[derive(Debug, Error)]
pub enum Error {
    /// The run was configured with values that make no sense.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Listing the bucket failed. Retrievals dispatched before the failure have completed.
    #[error("failed to list bucket objects")]
    Listing(#[source] StorageError),

    /// The sample collector task did not finish.
    #[error("sample collector failed")]
    Collector(#[from] tokio::task::JoinError),

    /// The final report could not be serialized.
    #[error("failed to serialize report")]
    Serialization(#[from] serde_json::Error),

    /// The final report could not be written.
    #[error("failed to write report")]
    Io(#[from] std::io::Error),
}

/// Result type for benchmark runs.
pub type Result<T, E = Error> = std::result::Result<T, E>;
