//! # Publish Flow
//!
//! Local source folders to published, catalogued volumes.
//!
//! 1. Discover volume folders under the source root (optionally one volume)
//! 2. Convert them, or count existing output when conversion is skipped
//! 3. Stop if any volume failed; nothing is uploaded or recorded
//! 4. Upload (optional, approval-gated); a declined upload ends the run
//!    before any catalog write
//! 5. Create or reuse the series and add every volume with its converted
//!    page count (optional)
//!
//! Converted counts are written to the catalog directly; the bucket is not
//! re-listed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use core_pipeline::discovery::discover_volume_dirs;
use core_pipeline::{ConversionJob, ConversionPipeline, UploadJob, UploadPipeline, VolumeResult};
use core_sync::naming::VolumeNameParser;
use core_sync::{ApplyPolicy, RegistrationReport, SeriesDetails};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{Result, ServiceError};
use crate::ArchiveService;

/// Parameters for [`ArchiveService::publish_series`]
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub slug: String,
    /// Folder holding one sub-folder per volume
    pub source_root: PathBuf,
    pub details: SeriesDetails,
    /// Restrict the run to one volume
    pub volume: Option<u32>,
    /// Reuse existing converted output instead of converting
    pub skip_conversion: bool,
    pub upload: bool,
    pub register: bool,
    /// Gates the upload and appending to an existing series
    pub policy: ApplyPolicy,
}

impl PublishRequest {
    pub fn new(
        slug: impl Into<String>,
        source_root: impl Into<PathBuf>,
        details: SeriesDetails,
    ) -> Self {
        Self {
            slug: slug.into(),
            source_root: source_root.into(),
            details,
            volume: None,
            skip_conversion: false,
            upload: true,
            register: true,
            policy: ApplyPolicy::AutoApprove,
        }
    }

    pub fn only_volume(mut self, volume: u32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn skip_conversion(mut self) -> Self {
        self.skip_conversion = true;
        self
    }

    pub fn without_upload(mut self) -> Self {
        self.upload = false;
        self
    }

    pub fn without_catalog(mut self) -> Self {
        self.register = false;
        self
    }

    pub fn with_policy(mut self, policy: ApplyPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// One volume as it went through the publish flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishedVolume {
    pub volume_number: u32,
    pub page_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub slug: String,
    pub output_dir: PathBuf,
    /// Ascending by volume number
    pub volumes: Vec<PublishedVolume>,
    /// False when existing output was counted instead
    pub converted: bool,
    pub uploaded: bool,
    /// The upload confirmation was declined; nothing was uploaded or recorded
    pub upload_declined: bool,
    /// `None` when catalog writes were not requested or the upload was declined
    pub registration: Option<RegistrationReport>,
}

impl PublishReport {
    pub fn page_counts(&self) -> BTreeMap<u32, u32> {
        self.volumes
            .iter()
            .map(|v| {
                (
                    v.volume_number,
                    u32::try_from(v.page_count).unwrap_or(u32::MAX),
                )
            })
            .collect()
    }
}

impl ArchiveService {
    /// Convert, upload and catalogue a series from local folders
    ///
    /// # Errors
    ///
    /// - `ServiceError::NoLocalVolumes` / `VolumeNotFound` if discovery finds nothing
    /// - `ServiceError::ConversionFailed` if any volume failed to convert
    /// - `ServiceError::UploadFailed` if any volume failed to upload
    /// - `ServiceError::Sync` if the catalog lookup or series creation fails
    #[instrument(skip(self, request), fields(slug = %request.slug))]
    pub async fn publish_series(&self, request: PublishRequest) -> Result<PublishReport> {
        let mut sources = discover_volume_dirs(&request.source_root, &VolumeNameParser::local())?;
        if sources.is_empty() {
            return Err(ServiceError::NoLocalVolumes {
                path: request.source_root.clone(),
            });
        }
        if let Some(volume) = request.volume {
            sources.retain(|s| s.volume_number == volume);
            if sources.is_empty() {
                return Err(ServiceError::VolumeNotFound {
                    volume,
                    path: request.source_root.clone(),
                });
            }
        }

        let output_dir = self.settings.output_dir(&request.slug);
        let conversion = ConversionPipeline::new(&output_dir)
            .with_quality(self.settings.quality)
            .with_workers(self.settings.workers)
            .with_event_bus(self.event_bus.clone());

        let volumes = if request.skip_conversion {
            count_existing(&conversion, sources.iter().map(|s| s.volume_number))?
        } else {
            let jobs: Vec<_> = sources
                .iter()
                .map(|s| ConversionJob::new(s.volume_number, &s.path))
                .collect();
            collect_counts(conversion.run(&jobs).await)
                .map_err(|volumes| ServiceError::ConversionFailed { volumes })?
        };
        info!(volumes = volumes.len(), "Volumes ready");

        let mut report = PublishReport {
            slug: request.slug.clone(),
            output_dir: output_dir.clone(),
            volumes,
            converted: !request.skip_conversion,
            uploaded: false,
            upload_declined: false,
            registration: None,
        };

        if request.upload {
            let message = format!(
                "Upload {} volume(s) to series/{}/?",
                report.volumes.len(),
                request.slug
            );
            if request.policy.approves(&message) {
                let jobs: Vec<_> = report
                    .volumes
                    .iter()
                    .map(|v| {
                        UploadJob::new(v.volume_number, conversion.volume_output_dir(v.volume_number))
                    })
                    .collect();
                let uploads = UploadPipeline::new(self.deps.storage.clone(), request.slug.clone())
                    .with_workers(self.settings.workers)
                    .with_event_bus(self.event_bus.clone())
                    .run(&jobs)
                    .await;
                collect_counts(uploads).map_err(|volumes| ServiceError::UploadFailed { volumes })?;
                report.uploaded = true;
            } else {
                info!("Upload declined, catalog left untouched");
                report.upload_declined = true;
                return Ok(report);
            }
        }

        if request.register {
            let registration = self
                .registrar()
                .register_volumes(
                    &request.slug,
                    &request.details,
                    &report.page_counts(),
                    &request.policy,
                )
                .await?;
            report.registration = Some(registration);
        }

        Ok(report)
    }
}

fn count_existing(
    conversion: &ConversionPipeline,
    volumes: impl Iterator<Item = u32>,
) -> Result<Vec<PublishedVolume>> {
    let mut counted = Vec::new();
    let mut empty = Vec::new();

    for volume_number in volumes {
        let page_count = conversion.count_converted(volume_number)?;
        if page_count == 0 {
            warn!(volume = volume_number, "No converted files found");
            empty.push(volume_number);
        } else {
            counted.push(PublishedVolume {
                volume_number,
                page_count,
            });
        }
    }

    if empty.is_empty() {
        Ok(counted)
    } else {
        Err(ServiceError::ConversionFailed { volumes: empty })
    }
}

/// Per-volume counts, or the failed volume numbers
fn collect_counts(
    results: Vec<VolumeResult<u64>>,
) -> std::result::Result<Vec<PublishedVolume>, Vec<u32>> {
    let mut counts = Vec::with_capacity(results.len());
    let mut failed = Vec::new();

    for outcome in results {
        match outcome.result {
            Ok(page_count) => counts.push(PublishedVolume {
                volume_number: outcome.volume,
                page_count,
            }),
            Err(e) => {
                warn!(volume = outcome.volume, error = %e, "Volume failed");
                failed.push(outcome.volume);
            }
        }
    }

    if failed.is_empty() {
        Ok(counts)
    } else {
        Err(failed)
    }
}
