//! Stream types exchanged between the storage layer and the benchmark.

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::StorageResult;

/// Identifier of an object within a bucket.
pub type ObjectKey = String;

/// Lazy sequence of object keys produced by a bucket listing.
///
/// Pages are only fetched from the service while the stream is being polled.
pub type KeyStream = BoxStream<'static, StorageResult<ObjectKey>>;

/// Body of a retrieved object, delivered in chunks.
pub type PayloadStream = BoxStream<'static, StorageResult<Bytes>>;
