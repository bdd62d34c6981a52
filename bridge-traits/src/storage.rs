//! Object Storage Abstractions
//!
//! Provides a platform-agnostic trait for the bucket that holds published
//! volumes. The contract mirrors S3-style listing: a prefix, an optional
//! delimiter that folds deeper keys into "folders", and an opaque continuation
//! token for paginated results.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// A single object returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key
    pub key: String,
    /// Object size in bytes
    pub size: u64,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Final path segment of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// One page of a listing
///
/// `folders` holds the common prefixes (each ending with the delimiter) and is
/// only populated when a delimiter was supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub folders: Vec<String>,
    pub objects: Vec<ObjectEntry>,
    pub next_continuation: Option<String>,
}

impl ListPage {
    /// Whether there are no further pages to fetch
    pub fn is_last(&self) -> bool {
        self.next_continuation.is_none()
    }
}

/// Object storage trait
///
/// Implementations must be safe to share across concurrent volume jobs.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::ObjectStorage;
///
/// async fn count(storage: &dyn ObjectStorage, prefix: &str) -> Result<usize> {
///     let mut total = 0;
///     let mut token = None;
///     loop {
///         let page = storage.list(prefix, None, token).await?;
///         total += page.objects.len();
///         token = page.next_continuation;
///         if token.is_none() {
///             break;
///         }
///     }
///     Ok(total)
/// }
/// ```
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// List one page of keys under `prefix`
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::StorageUnavailable` on any transport failure.
    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<String>,
    ) -> Result<ListPage>;

    /// Store `body` under `key`, replacing any previous object
    ///
    /// Puts are overwrite-idempotent; no versioning is kept.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<()>;
}
