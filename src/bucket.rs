//! Storage collaborator.
//!
//! The player only ever needs four things from the bucket: a one-level listing
//! of a prefix, an existence probe for a key, the raw bytes of a small object
//! (sidecar metadata) and a presigned GET URL for a track. [`Bucket`] captures
//! exactly that so the folder view can be driven by S3 in production and by an
//! in-memory map in tests.
use std::{future::Future, sync::Arc, time::Duration};

use aws_sdk_s3::{
    Client as S3Client,
    error::{DisplayErrorContext, SdkError},
    presigning::PresigningConfig,
};

#[cfg(feature = "trace")]
use tracing::Instrument;


/// One level of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Object keys directly below the prefix.
    pub entries: Vec<String>,
    /// Common prefixes (sub-folders), each ending in `/`.
    pub prefixes: Vec<String>,
}

impl Listing {
    /// Files first, then folders, in the order the store returned them.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().chain(self.prefixes.iter()).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.prefixes.is_empty()
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    NotFound,
    Service(String),
}

impl std::fmt::Display for BucketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketError::NotFound => write!(f, "not found"),
            BucketError::Service(message) => write!(f, "storage error: {}", message),
        }
    }
}

impl std::error::Error for BucketError {}

impl<E, R> From<SdkError<E, R>> for BucketError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(error: SdkError<E, R>) -> Self {
        BucketError::Service(DisplayErrorContext(&error).to_string())
    }
}


/// Read-only view of the object store backing the player.
pub trait Bucket: Send + Sync + 'static {
    /// List the immediate children of `path/`.
    ///
    /// Returns `Ok(None)` when nothing lives under the prefix, which is how a
    /// missing folder looks in S3.
    fn list_folder(&self, path: &str) -> impl Future<Output = Result<Option<Listing>, BucketError>> + Send;

    /// Whether an object with exactly this key exists.
    fn file_exists(&self, key: &str) -> impl Future<Output = Result<bool, BucketError>> + Send;

    /// Fetch an object's body.
    fn fetch(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, BucketError>> + Send;

    /// Presigned GET URL for `key`, valid for `expires_in`.
    fn presign_get(&self, key: &str, expires_in: Duration) -> impl Future<Output = Result<String, BucketError>> + Send;
}


/// [`Bucket`] backed by an AWS S3 bucket.
#[derive(Clone)]
pub struct S3Bucket {
    bucket: String,
    client: Arc<S3Client>,
}

impl S3Bucket {
    pub fn new(bucket: impl Into<String>, client: S3Client) -> Self {
        Self {
            bucket: bucket.into(),
            client: Arc::new(client),
        }
    }
}

impl Bucket for S3Bucket {
    async fn list_folder(&self, path: &str) -> Result<Option<Listing>, BucketError> {
        let prefix = format!("{}/", path.trim_matches('/'));
        let request = self.client.list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .delimiter("/")
            .send();

        #[cfg(feature = "trace")]
        let request = request.instrument(
            tracing::info_span!("s3_list_objects", bucket = %self.bucket, prefix = %prefix)
        );

        let output = request.await?;
        if output.key_count().unwrap_or(0) == 0 {
            return Ok(None);
        }

        let entries = output.contents()
            .iter()
            .filter_map(|object| object.key())
            .map(String::from)
            .collect();
        let prefixes = output.common_prefixes()
            .iter()
            .filter_map(|prefix| prefix.prefix())
            .map(String::from)
            .collect();

        Ok(Some(Listing { entries, prefixes }))
    }

    async fn file_exists(&self, key: &str) -> Result<bool, BucketError> {
        // S3 rejects an empty key outright; the bucket root is never a file
        if key.is_empty() {
            return Ok(false);
        }

        let request = self.client.head_object()
            .bucket(&self.bucket)
            .key(key)
            .send();

        #[cfg(feature = "trace")]
        let request = request.instrument(
            tracing::info_span!("s3_head_object", bucket = %self.bucket, key = %key)
        );

        match request.await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(error)) if error.err().is_not_found() => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, BucketError> {
        let request = self.client.get_object()
            .bucket(&self.bucket)
            .key(key)
            .send();

        #[cfg(feature = "trace")]
        let request = request.instrument(
            tracing::info_span!("s3_get_object", bucket = %self.bucket, key = %key)
        );

        let output = match request.await {
            Ok(output) => output,
            Err(SdkError::ServiceError(error)) if error.err().is_no_such_key() => {
                return Err(BucketError::NotFound);
            }
            Err(error) => return Err(error.into()),
        };

        let body = output.body
            .collect()
            .await
            .map_err(|e| BucketError::Service(e.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, BucketError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| BucketError::Service(e.to_string()))?;

        let request = self.client.get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await?;

        Ok(request.uri().to_string())
    }
}
