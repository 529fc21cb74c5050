use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::StorageResult;
use crate::stream::{KeyStream, PayloadStream};

/// A type-erased, shareable [`Storage`] instance.
pub type BoxedStorage = Arc<dyn Storage>;

/// Read-only access to the objects of a single bucket.
///
/// Implementations are bound to one bucket when they are constructed and are shared by all
/// concurrent retrievals, so they must be cheap to call from many tasks at once.
#[async_trait::async_trait]
pub trait Storage: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// The name of the bucket this backend reads from.
    fn bucket(&self) -> &str;

    /// Lists every key in the bucket.
    ///
    /// The returned stream is lazy and not restartable. An `Err` item means the listing
    /// cannot continue.
    fn list_keys(&self) -> KeyStream;

    /// Opens a streamed read of the object with the given key.
    ///
    /// Fails if the request could not be sent or the service rejected it before the first
    /// byte of the body. Errors while the body is being read surface through the stream.
    async fn get_object(&self, key: &str) -> StorageResult<GetResponse>;
}

/// A successfully opened object retrieval.
pub struct GetResponse {
    /// The status code the service answered with.
    pub status: u16,
    /// The object body.
    pub stream: PayloadStream,
}

impl Debug for GetResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
