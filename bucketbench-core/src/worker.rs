//! Retrieval of a single object.

use bucketbench_service::{GetResponse, ObjectKey, Storage};
use futures_util::StreamExt;
use tokio::time::Instant;

use crate::sample::{STATUS_NONE, Sample};

/// Retrieves one object, discards its bytes and measures the attempt.
///
/// Never fails: errors before the first byte and errors while reading the body are both
/// recorded in the returned sample, with the status reported by the storage service and
/// the number of bytes read until then.
pub async fn retrieve(storage: &dyn Storage, key: ObjectKey) -> Sample {
    let start = Instant::now();

    let (status, size) = match storage.get_object(&key).await {
        Ok(response) => drain(&key, response).await,
        Err(err) => {
            tracing::warn!(
                error = &err as &dyn std::error::Error,
                key = %key,
                "failed to open object"
            );
            (err.status().unwrap_or(STATUS_NONE), 0)
        }
    };

    let sample = Sample {
        size,
        key,
        status,
        duration: start.elapsed(),
    };
    tracing::debug!(?sample, "retrieval finished");
    sample
}

/// Reads the body to the end, returning the resulting status and the number of bytes read.
///
/// A complete body keeps the status of the response. A failed read reports the status of the
/// failure instead.
async fn drain(key: &str, response: GetResponse) -> (u16, u64) {
    let GetResponse { status, mut stream } = response;
    tracing::trace!(key, status, "object opened");

    let mut size = 0;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => size += bytes.len() as u64,
            Err(err) => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    key,
                    size,
                    "failed to read object"
                );
                return (err.status().unwrap_or(STATUS_NONE), size);
            }
        }
    }

    (status, size)
}
