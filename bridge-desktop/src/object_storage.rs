//! Object storage implementation using `object_store`

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{ListPage, ObjectEntry, ObjectStorage},
};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{
    aws::AmazonS3Builder, memory::InMemory, path::Path, Attribute, Attributes, ObjectStore,
    PutOptions, PutPayload,
};
use tracing::{debug, warn};

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Options {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// `ObjectStorage` backed by any `object_store::ObjectStore`
///
/// `object_store` follows pagination internally, so every page returned here
/// is the last one.
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreStorage {
    /// Wrap an existing store
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Build a client for an S3-compatible endpoint (R2, MinIO, AWS)
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::NotAvailable` if the builder rejects the options.
    pub fn s3(options: &S3Options) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&options.bucket)
            .with_region(&options.region)
            .with_access_key_id(&options.access_key_id)
            .with_secret_access_key(&options.secret_access_key);

        if !options.endpoint.is_empty() {
            builder = builder.with_endpoint(&options.endpoint);
        }

        let store = builder
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("Failed to build S3 store: {}", e)))?;

        debug!(bucket = %options.bucket, endpoint = %options.endpoint, "Created S3 object store");
        Ok(Self::new(Arc::new(store)))
    }

    /// Process-local store, used by tests and dry runs
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    fn to_path(prefix: &str) -> Option<Path> {
        let trimmed = prefix.trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(Path::from(trimmed))
        }
    }

    fn map_error(e: object_store::Error) -> BridgeError {
        warn!(error = %e, "Object store request failed");
        BridgeError::StorageUnavailable(e.to_string())
    }
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        _continuation: Option<String>,
    ) -> Result<ListPage> {
        let path = Self::to_path(prefix);

        let page = match delimiter {
            Some(_) => {
                let result = self
                    .store
                    .list_with_delimiter(path.as_ref())
                    .await
                    .map_err(Self::map_error)?;

                ListPage {
                    folders: result
                        .common_prefixes
                        .iter()
                        .map(|p| format!("{}/", p))
                        .collect(),
                    objects: result
                        .objects
                        .into_iter()
                        .map(|meta| ObjectEntry::new(meta.location.to_string(), meta.size as u64))
                        .collect(),
                    next_continuation: None,
                }
            }
            None => {
                let metas: Vec<_> = self
                    .store
                    .list(path.as_ref())
                    .try_collect()
                    .await
                    .map_err(Self::map_error)?;

                ListPage {
                    folders: Vec::new(),
                    objects: metas
                        .into_iter()
                        .map(|meta| ObjectEntry::new(meta.location.to_string(), meta.size as u64))
                        .collect(),
                    next_continuation: None,
                }
            }
        };

        debug!(
            prefix = prefix,
            folders = page.folders.len(),
            objects = page.objects.len(),
            "Listed objects"
        );
        Ok(page)
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<()> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        attributes.insert(Attribute::CacheControl, cache_control.to_string().into());

        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let size = body.len();
        self.store
            .put_opts(&Path::from(key), PutPayload::from(body), opts)
            .await
            .map_err(Self::map_error)?;

        debug!(key = key, size = size, "Stored object");
        Ok(())
    }
}
