//! # Inventory Readers
//!
//! Read-only views of what physically exists in the bucket and what the
//! catalog believes exists.
//!
//! - [`BucketInventory`] lists `series/{slug}/` folders, parses their volume
//!   numbers and counts the objects in each. Every listing follows continuation
//!   tokens until exhausted.
//! - [`CatalogInventory`] fetches a series record and derives its
//!   `volume -> page count` map.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bridge_traits::storage::ObjectStorage;
use core_catalog::{CatalogRepository, Series};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::naming::{self, VolumeNameParser};

/// One volume folder found in the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketVolumeEntry {
    pub volume_number: u32,
    pub file_count: u32,
}

impl BucketVolumeEntry {
    pub fn new(volume_number: u32, file_count: u32) -> Self {
        Self {
            volume_number,
            file_count,
        }
    }
}

/// Bucket Inventory Reader
#[derive(Clone)]
pub struct BucketInventory {
    storage: Arc<dyn ObjectStorage>,
    parser: VolumeNameParser,
}

impl BucketInventory {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self::with_parser(storage, VolumeNameParser::bucket())
    }

    pub fn with_parser(storage: Arc<dyn ObjectStorage>, parser: VolumeNameParser) -> Self {
        Self { storage, parser }
    }

    /// Volumes stored for `slug`, ascending by volume number
    ///
    /// Folders that do not parse as a volume are ignored. When two folders
    /// parse to the same number the first one listed is used.
    ///
    /// # Errors
    ///
    /// Any transport failure fails the whole call with
    /// `SyncError::StorageUnavailable`; no partial result is returned.
    pub async fn list(&self, slug: &str) -> Result<Vec<BucketVolumeEntry>> {
        let folders = self.list_folders(&naming::series_prefix(slug)).await?;

        let mut volumes: BTreeMap<u32, String> = BTreeMap::new();
        for folder in folders {
            let name = naming::last_segment(&folder);
            match self.parser.parse(name) {
                Some(number) => {
                    if volumes.contains_key(&number) {
                        warn!(slug, folder = %folder, volume = number, "Duplicate volume folder ignored");
                    } else {
                        volumes.insert(number, folder);
                    }
                }
                None => debug!(slug, folder = %folder, "Skipping non-volume folder"),
            }
        }

        let mut entries = Vec::with_capacity(volumes.len());
        for (volume_number, folder) in volumes {
            let file_count = self.count_objects(&folder).await?;
            entries.push(BucketVolumeEntry::new(volume_number, file_count));
        }

        debug!(slug, volumes = entries.len(), "Listed bucket volumes");
        Ok(entries)
    }

    /// Slugs of every series folder under `series/`, sorted
    pub async fn list_series_slugs(&self) -> Result<Vec<String>> {
        let root = format!("{}/", naming::SERIES_ROOT);
        let slugs: BTreeSet<String> = self
            .list_folders(&root)
            .await?
            .iter()
            .map(|folder| naming::last_segment(folder).to_string())
            .filter(|slug| !slug.is_empty())
            .collect();

        Ok(slugs.into_iter().collect())
    }

    async fn list_folders(&self, prefix: &str) -> Result<Vec<String>> {
        let mut folders = Vec::new();
        let mut continuation = None;
        let mut pages = 0;

        loop {
            pages += 1;
            let page = self
                .storage
                .list(prefix, Some("/"), continuation.take())
                .await?;
            folders.extend(page.folders);

            continuation = page.next_continuation;
            if continuation.is_none() {
                break;
            }
        }

        debug!(prefix, pages, folders = folders.len(), "Listed folders");
        Ok(folders)
    }

    async fn count_objects(&self, prefix: &str) -> Result<u32> {
        let mut count: u32 = 0;
        let mut continuation = None;

        loop {
            let page = self.storage.list(prefix, None, continuation.take()).await?;
            let files = page
                .objects
                .iter()
                .filter(|object| !object.file_name().is_empty())
                .count();
            count = count.saturating_add(u32::try_from(files).unwrap_or(u32::MAX));

            continuation = page.next_continuation;
            if continuation.is_none() {
                break;
            }
        }

        Ok(count)
    }
}

/// Catalog view of one series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInventory {
    pub series: Series,
    pub page_counts: BTreeMap<u32, u32>,
}

/// Database Inventory Reader
#[derive(Clone)]
pub struct CatalogInventory {
    repository: Arc<dyn CatalogRepository>,
}

impl CatalogInventory {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self { repository }
    }

    /// `Ok(None)` when no series has this slug
    pub async fn fetch_series(&self, slug: &str) -> Result<Option<SeriesInventory>> {
        let found = self.repository.get_series_by_slug(slug).await?;

        Ok(found.map(|with_volumes| SeriesInventory {
            page_counts: with_volumes.page_counts(),
            series: with_volumes.series,
        }))
    }
}
