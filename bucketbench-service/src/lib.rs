//! The storage capability consumed by the benchmark.
//!
//! The benchmark engine never talks to a storage protocol directly. It only needs two
//! operations: lazily listing the keys of a bucket, and opening a streamed read of a single
//! object. Both are described by the [`Storage`] trait, and [`S3Compatible`] implements them
//! for any service speaking the S3 API.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod error;
pub mod stream;

pub use backend::{
    BoxedStorage, DEFAULT_PAGE_SIZE, GetResponse, S3Compatible, S3CompatibleConfig, Storage,
};
pub use error::{StorageError, StorageResult};
pub use stream::{KeyStream, ObjectKey, PayloadStream};
