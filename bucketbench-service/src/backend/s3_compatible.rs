use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::request::ResponseDataStream;
use s3::{Bucket, Region};

use crate::backend::common::{GetResponse, Storage};
use crate::error::{StorageError, StorageResult};
use crate::stream::{KeyStream, ObjectKey};

/// Number of keys requested per listing page unless configured otherwise.
///
/// Smaller pages cause more round trips but keep the listing's memory footprint low.
pub const DEFAULT_PAGE_SIZE: usize = 3000;

/// Connection settings for an [`S3Compatible`] backend.
#[derive(Clone)]
pub struct S3CompatibleConfig {
    /// Host (and optional port) of the service, without scheme.
    pub endpoint: String,
    /// Whether to connect using TLS.
    pub https: bool,
    /// Region name sent with signed requests.
    pub region: String,
    /// The bucket to read from.
    pub bucket: String,
    /// Access key id. If unset, credentials are resolved from the environment.
    pub access_key: Option<String>,
    /// Secret access key. If unset, credentials are resolved from the environment.
    pub secret_key: Option<String>,
    /// Address the bucket as part of the path instead of the host name.
    pub path_style: bool,
    /// Connect timeout of the HTTP client. Body transfers are not bounded by it.
    pub request_timeout: Option<Duration>,
    /// Number of keys to request per listing page.
    pub page_size: usize,
}

impl S3CompatibleConfig {
    /// Returns the endpoint as a URL including the scheme.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint)
    }
}

impl Default for S3CompatibleConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            https: true,
            region: String::new(),
            bucket: String::new(),
            access_key: None,
            secret_key: None,
            path_style: false,
            request_timeout: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl fmt::Debug for S3CompatibleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3CompatibleConfig")
            .field("endpoint", &self.endpoint)
            .field("https", &self.https)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("path_style", &self.path_style)
            .field("request_timeout", &self.request_timeout)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// A [`Storage`] backed by any service implementing the S3 API.
pub struct S3Compatible {
    bucket: Box<Bucket>,
    bucket_name: String,
    page_size: usize,
}

impl S3Compatible {
    /// Creates a new S3 compatible backend bound to the configured bucket.
    pub fn new(config: S3CompatibleConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|err| StorageError::generic("failed to resolve credentials", err))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint_url(),
        };

        let mut bucket = Bucket::new(config.bucket.as_str(), region, credentials)
            .map_err(|err| StorageError::generic("failed to create bucket client", err))?;

        if config.path_style {
            bucket = bucket.with_path_style();
        }

        if let Some(request_timeout) = config.request_timeout {
            bucket = bucket
                .with_request_timeout(request_timeout)
                .map_err(|err| StorageError::generic("failed to set request timeout", err))?;
        }

        Ok(Self {
            bucket,
            bucket_name: config.bucket,
            page_size: config.page_size.max(1),
        })
    }
}

impl fmt::Debug for S3Compatible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Compatible")
            .field("bucket", &self.bucket_name)
            .field("endpoint", &self.bucket.host())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Storage for S3Compatible {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }

    fn list_keys(&self) -> KeyStream {
        list_pages(self.bucket.clone(), self.page_size).boxed()
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object(&self, key: &str) -> StorageResult<GetResponse> {
        let ResponseDataStream { bytes, status_code } = self
            .bucket
            .get_object_stream(key)
            .await
            .map_err(|err| map_s3_error("failed to open object", err))?;

        let stream = bytes
            .map(|chunk| chunk.map_err(|err| map_s3_error("failed to read object body", err)))
            .boxed();

        Ok(GetResponse {
            status: status_code,
            stream,
        })
    }
}

/// Pages through `ListObjectsV2`, requesting the next page only once the previous one has
/// been consumed.
fn list_pages(
    bucket: Box<Bucket>,
    page_size: usize,
) -> impl futures_util::Stream<Item = StorageResult<ObjectKey>> + Send + 'static {
    async_stream::try_stream! {
        let mut continuation_token: Option<String> = None;
        loop {
            tracing::trace!(?continuation_token, "listing page");
            let (page, _status) = bucket
                .list_page(
                    String::new(),
                    None,
                    continuation_token.take(),
                    None,
                    Some(page_size),
                )
                .await
                .map_err(|err| map_s3_error("failed to list objects", err))?;

            for object in page.contents {
                yield object.key;
            }

            match page.next_continuation_token {
                Some(token) if page.is_truncated => continuation_token = Some(token),
                _ => break,
            }
        }
    }
}

fn map_s3_error(context: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(status, message) => StorageError::Status { status, message },
        err => StorageError::generic(context, err),
    }
}
