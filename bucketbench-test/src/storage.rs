//! Scriptable in-memory storage for tests.
//!
//! [`ScriptedStorage`] serves zero-filled objects of fixed sizes and can be told to fail
//! individual retrievals, either before the first byte or in the middle of the body, and to
//! abort the listing after a number of keys. It counts how many keys were pulled from the
//! listing and how many retrievals overlapped, so tests can observe laziness and the
//! concurrency ceiling.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bucketbench_service::{GetResponse, KeyStream, PayloadStream, Storage, StorageError, StorageResult};
use bytes::Bytes;
use futures_util::StreamExt;

/// Size of the chunks the object bodies are delivered in.
const CHUNK_SIZE: usize = 1024;

/// How a scripted object responds to a retrieval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    /// Serve the full body with status 200.
    Serve,
    /// Serve the full body with a different status.
    Respond {
        /// Status of the response.
        status: u16,
    },
    /// Fail before the first byte with the given status.
    FailOpen {
        /// Status reported by the failure.
        status: u16,
    },
    /// Serve `after` bytes, then fail. `status` of `None` simulates a connection reset.
    FailMidStream {
        /// Number of bytes delivered before the failure.
        after: usize,
        /// Status reported by the failure, if any.
        status: Option<u16>,
    },
}

#[derive(Clone, Debug)]
struct ScriptedObject {
    key: String,
    size: usize,
    behavior: Behavior,
}

/// A [`Storage`] whose contents and failures are defined up front.
#[derive(Clone, Debug)]
pub struct ScriptedStorage {
    bucket: String,
    objects: Vec<ScriptedObject>,
    latency: Duration,
    fail_listing_after: Option<usize>,

    listed: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedStorage {
    /// Creates an empty bucket with the given name.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Vec::new(),
            latency: Duration::ZERO,
            fail_listing_after: None,
            listed: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
        }
    }

    /// Adds an object that is served successfully.
    pub fn with_object(self, key: impl Into<String>, size: usize) -> Self {
        self.with_scripted_object(key, size, Behavior::Serve)
    }

    /// Adds an object that responds according to `behavior`.
    pub fn with_scripted_object(
        mut self,
        key: impl Into<String>,
        size: usize,
        behavior: Behavior,
    ) -> Self {
        self.objects.push(ScriptedObject {
            key: key.into(),
            size,
            behavior,
        });
        self
    }

    /// Adds `count` successful objects named `object-0000`, `object-0001`, ...
    pub fn with_objects(mut self, count: usize, size: usize) -> Self {
        for idx in 0..count {
            self = self.with_object(format!("object-{idx:04}"), size);
        }
        self
    }

    /// Delays every retrieval by `latency` before the response is returned.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the listing fail after yielding `count` keys.
    pub fn fail_listing_after(mut self, count: usize) -> Self {
        self.fail_listing_after = Some(count);
        self
    }

    /// Number of listing items (keys or errors) pulled so far.
    pub fn listed(&self) -> usize {
        self.listed.load(Ordering::SeqCst)
    }

    /// Highest number of retrievals that were waiting for a response at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Storage for ScriptedStorage {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_keys(&self) -> KeyStream {
        let mut items: Vec<StorageResult<String>> =
            self.objects.iter().map(|object| Ok(object.key.clone())).collect();

        if let Some(count) = self.fail_listing_after {
            items.truncate(count);
            items.push(Err(StorageError::Status {
                status: 500,
                message: "scripted listing failure".into(),
            }));
        }

        let listed = Arc::clone(&self.listed);
        futures_util::stream::iter(items)
            .inspect(move |_| {
                listed.fetch_add(1, Ordering::SeqCst);
            })
            .boxed()
    }

    async fn get_object(&self, key: &str) -> StorageResult<GetResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let Some(object) = self.objects.iter().find(|object| object.key == key) else {
            return Err(StorageError::Status {
                status: 404,
                message: "NoSuchKey".into(),
            });
        };

        match object.behavior {
            Behavior::Serve => Ok(GetResponse {
                status: 200,
                stream: body(object.size, None),
            }),
            Behavior::Respond { status } => Ok(GetResponse {
                status,
                stream: body(object.size, None),
            }),
            Behavior::FailOpen { status } => Err(StorageError::Status {
                status,
                message: "scripted open failure".into(),
            }),
            Behavior::FailMidStream { after, status } => {
                let failure = match status {
                    Some(status) => StorageError::Status {
                        status,
                        message: "scripted read failure".into(),
                    },
                    None => StorageError::generic("failed to read object body", "connection reset"),
                };
                Ok(GetResponse {
                    status: 200,
                    stream: body(after.min(object.size), Some(failure)),
                })
            }
        }
    }
}

/// Builds a zero-filled body of `size` bytes, optionally followed by an error.
fn body(size: usize, failure: Option<StorageError>) -> PayloadStream {
    let mut chunks: Vec<StorageResult<Bytes>> = Vec::new();
    let mut remaining = size;
    while remaining > 0 {
        let len = remaining.min(CHUNK_SIZE);
        chunks.push(Ok(Bytes::from(vec![0; len])));
        remaining -= len;
    }
    if let Some(failure) = failure {
        chunks.push(Err(failure));
    }

    futures_util::stream::iter(chunks).boxed()
}
