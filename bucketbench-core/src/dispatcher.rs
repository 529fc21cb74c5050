//! Bounded fan-out of retrievals onto independent tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bucketbench_service::{BoxedStorage, StorageError};
use tokio::sync::{Semaphore, mpsc};

use crate::enumerator::Enumerator;
use crate::sample::Sample;
use crate::worker;

/// Spawns one retrieval task per admitted key, with at most `concurrency` running at once.
///
/// Every task holds a pool slot until its sample has been sent, so once [`drain`](Self::drain)
/// returns all samples of this dispatcher are on the stream.
#[derive(Debug)]
pub struct Dispatcher {
    storage: BoxedStorage,
    semaphore: Arc<Semaphore>,
    concurrency: u32,
    samples: mpsc::Sender<Sample>,
    dispatched: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Creates a dispatcher that sends samples into `samples`.
    ///
    /// `dispatched` is incremented for every spawned retrieval. Nothing else writes to it.
    pub fn new(
        storage: BoxedStorage,
        concurrency: u32,
        samples: mpsc::Sender<Sample>,
        dispatched: Arc<AtomicU64>,
    ) -> Self {
        Self {
            storage,
            semaphore: Arc::new(Semaphore::new(concurrency as usize)),
            concurrency,
            samples,
            dispatched,
        }
    }

    /// Dispatches keys until the enumerator stops, returning the number of retrievals started.
    ///
    /// A free slot is acquired before the next key is requested, so the enumerator's limit check
    /// runs right before the retrieval is spawned. A listing error stops dispatching; retrievals
    /// already started keep running.
    pub async fn dispatch_all(&self, enumerator: &mut Enumerator) -> Result<u64, StorageError> {
        let mut started = 0;

        loop {
            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                // the semaphore is never closed
                return Ok(started);
            };

            let Some(key) = enumerator.next().await? else {
                return Ok(started);
            };

            started += 1;
            self.dispatched.fetch_add(1, Ordering::Relaxed);

            let storage = Arc::clone(&self.storage);
            let samples = self.samples.clone();
            tokio::spawn(async move {
                let sample = worker::retrieve(storage.as_ref(), key).await;
                if samples.send(sample).await.is_err() {
                    tracing::error!("sample stream closed before all retrievals finished");
                }
                drop(permit);
            });
        }
    }

    /// Waits for every started retrieval to finish, then closes this side of the sample stream.
    pub async fn drain(self) {
        // by acquiring *all* the permits, we wait for all outstanding tasks to finish
        let _permits = self.semaphore.acquire_many(self.concurrency).await;
        tracing::debug!(
            dispatched = self.dispatched.load(Ordering::Relaxed),
            "all retrievals finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bucketbench_test::ScriptedStorage;

    use super::*;
    use crate::limits::Limits;
    use crate::sample::STATUS_OK;

    async fn recv_all(samples: &mut mpsc::Receiver<Sample>) -> Vec<Sample> {
        let mut received = Vec::new();
        while let Some(sample) = samples.recv().await {
            received.push(sample);
        }
        received
    }

    #[tokio::test(start_paused = true)]
    async fn respects_the_concurrency_ceiling() {
        let storage = ScriptedStorage::new("bucket")
            .with_objects(20, 100)
            .with_latency(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::channel(64);
        let dispatched = Arc::new(AtomicU64::new(0));

        let mut enumerator = Enumerator::new(&storage, Limits::UNLIMITED);
        let dispatcher = Dispatcher::new(
            Arc::new(storage.clone()),
            4,
            tx,
            Arc::clone(&dispatched),
        );

        assert_eq!(dispatcher.dispatch_all(&mut enumerator).await.unwrap(), 20);
        dispatcher.drain().await;

        let samples = recv_all(&mut rx).await;
        assert_eq!(samples.len(), 20);
        assert!(samples.iter().all(|sample| sample.status == STATUS_OK));
        assert_eq!(dispatched.load(Ordering::Relaxed), 20);
        assert_eq!(storage.max_in_flight(), 4);
    }

    #[tokio::test]
    async fn drain_waits_for_every_sample() {
        let storage = ScriptedStorage::new("bucket").with_objects(50, 10);
        let (tx, mut rx) = mpsc::channel(64);

        let mut enumerator = Enumerator::new(&storage, Limits::UNLIMITED);
        let dispatcher = Dispatcher::new(Arc::new(storage), 8, tx, Arc::default());
        dispatcher.dispatch_all(&mut enumerator).await.unwrap();
        dispatcher.drain().await;

        // the stream is closed once the dispatcher is drained
        assert_eq!(recv_all(&mut rx).await.len(), 50);
    }

    #[tokio::test]
    async fn listing_error_stops_dispatching() {
        let storage = ScriptedStorage::new("bucket")
            .with_objects(10, 10)
            .fail_listing_after(3);
        let (tx, mut rx) = mpsc::channel(16);

        let mut enumerator = Enumerator::new(&storage, Limits::UNLIMITED);
        let dispatcher = Dispatcher::new(Arc::new(storage), 2, tx, Arc::default());
        let err = dispatcher.dispatch_all(&mut enumerator).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        dispatcher.drain().await;

        // retrievals started before the failure still complete
        assert_eq!(recv_all(&mut rx).await.len(), 3);
    }

    #[tokio::test]
    async fn object_limit_bounds_dispatch() {
        let storage = ScriptedStorage::new("bucket").with_objects(10, 10);
        let (tx, mut rx) = mpsc::channel(16);

        let limits = Limits {
            max_objects: Some(3),
            max_duration: None,
        };
        let mut enumerator = Enumerator::new(&storage, limits);
        let dispatcher = Dispatcher::new(Arc::new(storage), 16, tx, Arc::default());
        assert_eq!(dispatcher.dispatch_all(&mut enumerator).await.unwrap(), 3);
        dispatcher.drain().await;

        assert_eq!(recv_all(&mut rx).await.len(), 3);
    }
}
