//! # Series Registration
//!
//! Creates a series record from published volumes, or appends volumes to an
//! existing one.
//!
//! - Unknown slug: the series is created with `total_volumes` set to the
//!   number of volumes being registered and, unless given, a cover pointing at
//!   the first page of volume 1.
//! - Known slug: appending requires approval under [`ApplyPolicy::Confirm`].
//!
//! Volumes are then added through the [`MutationApplier`], so volumes that are
//! already recorded are skipped rather than failed.

use std::collections::BTreeMap;
use std::sync::Arc;

use bridge_traits::storage::ObjectStorage;
use core_catalog::{CatalogRepository, NewSeries, SeriesStatus};
use serde::Serialize;
use tracing::{info, instrument};

use crate::applier::{ApplyReport, MutationApplier};
use crate::diff::ChangeEntry;
use crate::error::{Result, SyncError};
use crate::inventory::BucketInventory;
use crate::naming;
use crate::reconcile::ApplyPolicy;

/// Descriptive fields for a series that may need creating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDetails {
    pub title: String,
    pub status: SeriesStatus,
    /// Defaults to the first page of volume 1 when `None`
    pub cover_url: Option<String>,
}

impl SeriesDetails {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: SeriesStatus::default(),
            cover_url: None,
        }
    }

    pub fn with_status(mut self, status: SeriesStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    DryRun,
    Declined,
    Applied(ApplyReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReport {
    pub slug: String,
    /// `None` when the series does not exist and nothing was created
    pub series_id: Option<String>,
    /// Whether this run created the series record
    pub created: bool,
    /// Volumes offered for registration
    pub volumes: usize,
    pub outcome: RegistrationOutcome,
}

impl RegistrationReport {
    pub fn apply_report(&self) -> Option<&ApplyReport> {
        match &self.outcome {
            RegistrationOutcome::Applied(report) => Some(report),
            _ => None,
        }
    }
}

/// Series Registrar
#[derive(Clone)]
pub struct SeriesRegistrar {
    bucket: BucketInventory,
    repository: Arc<dyn CatalogRepository>,
    applier: MutationApplier,
    cdn_base: Option<String>,
}

impl SeriesRegistrar {
    pub fn new(storage: Arc<dyn ObjectStorage>, repository: Arc<dyn CatalogRepository>) -> Self {
        Self {
            bucket: BucketInventory::new(storage),
            applier: MutationApplier::new(repository.clone()),
            repository,
            cdn_base: None,
        }
    }

    /// Base URL used for default cover references
    pub fn with_cdn_base(mut self, cdn_base: impl Into<String>) -> Self {
        self.cdn_base = Some(cdn_base.into());
        self
    }

    /// Replace the applier, e.g. to attach an event bus or threshold
    pub fn with_applier(mut self, applier: MutationApplier) -> Self {
        self.applier = applier;
        self
    }

    /// Register every volume currently in the bucket for `slug`
    ///
    /// # Errors
    ///
    /// - `SyncError::NoVolumesInBucket` if the bucket holds no volumes
    /// - `SyncError::StorageUnavailable` if the bucket cannot be listed
    #[instrument(skip(self, details, policy), fields(policy = ?policy))]
    pub async fn register_from_bucket(
        &self,
        slug: &str,
        details: &SeriesDetails,
        policy: &ApplyPolicy,
    ) -> Result<RegistrationReport> {
        let entries = self.bucket.list(slug).await?;
        if entries.is_empty() {
            return Err(SyncError::NoVolumesInBucket {
                slug: slug.to_string(),
            });
        }

        let mut volumes = BTreeMap::new();
        for entry in entries {
            volumes.entry(entry.volume_number).or_insert(entry.file_count);
        }

        self.register_volumes(slug, details, &volumes, policy).await
    }

    /// Create-or-append `slug` and add `volumes` (`volume -> page count`)
    ///
    /// # Errors
    ///
    /// - `SyncError::InvalidInput` if `volumes` is empty
    /// - `SyncError::Catalog` if the lookup or series creation fails
    pub async fn register_volumes(
        &self,
        slug: &str,
        details: &SeriesDetails,
        volumes: &BTreeMap<u32, u32>,
        policy: &ApplyPolicy,
    ) -> Result<RegistrationReport> {
        if volumes.is_empty() {
            return Err(SyncError::InvalidInput {
                field: "volumes".to_string(),
                message: "nothing to register".to_string(),
            });
        }

        let existing = self.repository.get_series_by_slug(slug).await?;
        let mut report = RegistrationReport {
            slug: slug.to_string(),
            series_id: existing.as_ref().map(|found| found.series.id.clone()),
            created: false,
            volumes: volumes.len(),
            outcome: RegistrationOutcome::DryRun,
        };

        if policy.is_dry_run() {
            return Ok(report);
        }

        let series_id = match existing {
            Some(found) => {
                info!(slug, id = %found.series.id, "Series exists, appending volumes");
                let message = format!(
                    "Series '{}' already exists. Add {} volume(s) to it?",
                    slug,
                    volumes.len()
                );
                if !policy.approves(&message) {
                    report.outcome = RegistrationOutcome::Declined;
                    return Ok(report);
                }
                found.series.id
            }
            None => {
                let id = self.create_series(slug, details, volumes.len()).await?;
                report.series_id = Some(id.clone());
                report.created = true;
                id
            }
        };

        let changes: Vec<ChangeEntry> = volumes
            .iter()
            .map(|(&volume, &pages)| ChangeEntry::add(volume, pages))
            .collect();
        let applied = self.applier.apply(slug, &series_id, &changes).await;
        report.outcome = RegistrationOutcome::Applied(applied);

        Ok(report)
    }

    async fn create_series(
        &self,
        slug: &str,
        details: &SeriesDetails,
        volume_count: usize,
    ) -> Result<String> {
        let cover = details
            .cover_url
            .clone()
            .unwrap_or_else(|| naming::cover_url(self.cdn_base.as_deref(), slug));
        let total = u32::try_from(volume_count).unwrap_or(u32::MAX);

        let new = NewSeries::new(slug, details.title.clone())
            .with_cover_url(cover)
            .with_total_volumes(total)
            .with_status(details.status);
        let id = self.repository.create_series(&new).await?;

        info!(slug, id = %id, total_volumes = total, "Created series");
        Ok(id)
    }
}
