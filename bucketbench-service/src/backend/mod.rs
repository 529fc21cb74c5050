//! Storage backends implementing the [`Storage`] capability.

mod common;
mod s3_compatible;

pub use common::{BoxedStorage, GetResponse, Storage};
pub use s3_compatible::{DEFAULT_PAGE_SIZE, S3Compatible, S3CompatibleConfig};
