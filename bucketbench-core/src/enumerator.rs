//! Lazy enumeration of the keys in a bucket, bounded by the run's [`Limits`].

use std::fmt;
use std::time::Duration;

use bucketbench_service::{KeyStream, ObjectKey, Storage, StorageError};
use futures_util::StreamExt;

use crate::limits::{Admission, Limits, StopReason};

/// Yields the keys of a bucket until the listing ends or a limit is reached.
///
/// The sequence is finite and cannot be restarted. Listing pages are only requested while
/// keys are being pulled, so nothing more is fetched from the service after a limit hits.
pub struct Enumerator {
    keys: KeyStream,
    admission: Admission,
    finished: bool,
    stop_reason: Option<StopReason>,
}

impl Enumerator {
    /// Starts enumerating the bucket of `storage`. The duration limit counts from here.
    pub fn new(storage: &dyn Storage, limits: Limits) -> Self {
        Self {
            keys: storage.list_keys(),
            admission: Admission::start(limits),
            finished: false,
            stop_reason: None,
        }
    }

    /// Returns the next admitted key, or `None` once enumeration has stopped.
    ///
    /// A listing error ends the enumeration; subsequent calls return `None`.
    pub async fn next(&mut self) -> Result<Option<ObjectKey>, StorageError> {
        if self.finished {
            return Ok(None);
        }
        if let Some(reason) = self.admission.check() {
            return Ok(self.stop(reason));
        }

        let key = match self.keys.next().await {
            Some(Ok(key)) => key,
            Some(Err(err)) => {
                self.finished = true;
                return Err(err);
            }
            None => return Ok(self.stop(StopReason::Exhausted)),
        };

        // fetching a listing page may take a while
        if let Some(reason) = self.admission.check() {
            return Ok(self.stop(reason));
        }

        self.admission.record();
        Ok(Some(key))
    }

    /// Number of keys yielded so far.
    pub fn admitted(&self) -> u64 {
        self.admission.admitted()
    }

    /// Time since enumeration started.
    pub fn elapsed(&self) -> Duration {
        self.admission.elapsed()
    }

    /// Why the enumeration stopped, or `None` if it is still running or failed.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    fn stop(&mut self, reason: StopReason) -> Option<ObjectKey> {
        self.finished = true;
        self.stop_reason = Some(reason);
        match reason {
            StopReason::Exhausted => {
                tracing::debug!(admitted = self.admitted(), "listing exhausted")
            }
            StopReason::ObjectLimit | StopReason::DurationLimit => tracing::info!(
                admitted = self.admitted(),
                elapsed = ?self.elapsed(),
                "{reason}, waiting for the started downloads to complete"
            ),
        }
        None
    }
}

impl fmt::Debug for Enumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumerator")
            .field("admission", &self.admission)
            .field("finished", &self.finished)
            .field("stop_reason", &self.stop_reason)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bucketbench_test::ScriptedStorage;

    use super::*;

    async fn drain(enumerator: &mut Enumerator) -> Vec<ObjectKey> {
        let mut keys = Vec::new();
        while let Some(key) = enumerator.next().await.unwrap() {
            keys.push(key);
        }
        keys
    }

    #[tokio::test]
    async fn yields_every_key_without_limits() {
        let storage = ScriptedStorage::new("bucket")
            .with_object("a", 1)
            .with_object("b", 2)
            .with_object("c", 3);

        let mut enumerator = Enumerator::new(&storage, Limits::UNLIMITED);
        assert_eq!(drain(&mut enumerator).await, ["a", "b", "c"]);
        assert_eq!(enumerator.stop_reason(), Some(StopReason::Exhausted));
        assert_eq!(enumerator.admitted(), 3);
    }

    #[tokio::test]
    async fn object_limit_stops_listing() {
        let storage = ScriptedStorage::new("bucket").with_objects(10, 1);
        let limits = Limits {
            max_objects: Some(3),
            max_duration: None,
        };

        let mut enumerator = Enumerator::new(&storage, limits);
        assert_eq!(drain(&mut enumerator).await.len(), 3);
        assert_eq!(enumerator.stop_reason(), Some(StopReason::ObjectLimit));

        // no key beyond the limit was pulled from the listing
        assert_eq!(storage.listed(), 3);
        assert_eq!(enumerator.next().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_limit_stops_listing() {
        let storage = ScriptedStorage::new("bucket").with_objects(10, 1);
        let limits = Limits {
            max_objects: None,
            max_duration: Some(Duration::from_secs(1)),
        };

        let mut enumerator = Enumerator::new(&storage, limits);
        assert!(enumerator.next().await.unwrap().is_some());
        assert!(enumerator.next().await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(enumerator.next().await.unwrap(), None);
        assert_eq!(enumerator.stop_reason(), Some(StopReason::DurationLimit));
        assert_eq!(enumerator.admitted(), 2);
    }

    #[tokio::test]
    async fn listing_error_ends_enumeration() {
        let storage = ScriptedStorage::new("bucket")
            .with_objects(5, 1)
            .fail_listing_after(2);

        let mut enumerator = Enumerator::new(&storage, Limits::UNLIMITED);
        assert!(enumerator.next().await.unwrap().is_some());
        assert!(enumerator.next().await.unwrap().is_some());

        let err = enumerator.next().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(enumerator.next().await.unwrap(), None);
        assert_eq!(enumerator.stop_reason(), None);
    }

    #[tokio::test]
    async fn empty_bucket_yields_nothing() {
        let storage = ScriptedStorage::new("bucket");
        let mut enumerator = Enumerator::new(&storage, Limits::UNLIMITED);
        assert!(drain(&mut enumerator).await.is_empty());
        assert_eq!(enumerator.stop_reason(), Some(StopReason::Exhausted));
    }
}
