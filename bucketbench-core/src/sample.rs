//! The measured outcome of a single retrieval.

use std::time::Duration;

/// Status recorded for a retrieval that completed successfully.
pub const STATUS_OK: u16 = 200;

/// Status recorded for a failure that carried no status code, such as a connection reset.
pub const STATUS_NONE: u16 = 0;

/// One measured retrieval attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Number of payload bytes read, including a partial read before a failure.
    pub size: u64,
    /// Key of the retrieved object.
    pub key: String,
    /// Status code of the attempt. See [`STATUS_OK`] and [`STATUS_NONE`].
    pub status: u16,
    /// Wall-clock time from opening the retrieval until the body was drained or failed.
    pub duration: Duration,
}

impl Sample {
    /// Returns `true` if the retrieval completed without error.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Throughput of this retrieval in bytes per second.
    ///
    /// Retrievals that took no measurable time have a rate of zero.
    pub fn rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.size as f64 / secs
        } else {
            0.0
        }
    }
}
