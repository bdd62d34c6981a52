//! # Upload Pipeline
//!
//! Publishes converted volumes to object storage.
//!
//! Each regular file in a volume's local directory, sorted by name, is put to
//! `series/{slug}/volume-NNN/{file name}`. Objects are immutable once
//! published, so they carry a year-long public cache lifetime. Re-uploading
//! overwrites in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::storage::ObjectStorage;
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, PipelineEvent, PipelineStage};
use core_sync::naming;
use tracing::{debug, info, instrument, warn};

use crate::convert::DEFAULT_WORKERS;
use crate::discovery;
use crate::error::{PipelineError, Result};
use crate::pool::{VolumeResult, VolumeTaskPool};

pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// MIME type for an uploaded file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("webp") => "image/webp",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// One volume to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub volume_number: u32,
    pub local_dir: PathBuf,
}

impl UploadJob {
    pub fn new(volume_number: u32, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            volume_number,
            local_dir: local_dir.into(),
        }
    }
}

/// Upload Pipeline
#[derive(Clone)]
pub struct UploadPipeline {
    storage: Arc<dyn ObjectStorage>,
    slug: String,
    workers: usize,
    event_bus: Option<EventBus>,
}

impl UploadPipeline {
    pub fn new(storage: Arc<dyn ObjectStorage>, slug: impl Into<String>) -> Self {
        Self {
            storage,
            slug: slug.into(),
            workers: DEFAULT_WORKERS,
            event_bus: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Upload every job; results are ascending by volume number.
    #[instrument(skip(self, jobs), fields(slug = %self.slug, volumes = jobs.len()))]
    pub async fn run(&self, jobs: &[UploadJob]) -> Vec<VolumeResult<u64>> {
        let mut pool = VolumeTaskPool::new(self.workers);
        for job in jobs {
            let pipeline = self.clone();
            let job = job.clone();
            pool.submit(job.volume_number, async move {
                pipeline.upload_volume(job).await
            });
        }

        let results = pool.join().await;
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(volumes = results.len(), failed, "Upload finished");
        results
    }

    async fn upload_volume(&self, job: UploadJob) -> Result<u64> {
        let volume = job.volume_number;
        let result = self.upload_volume_inner(&job).await;

        match &result {
            Ok(files) => {
                info!(volume, files, "Volume uploaded");
                self.emit(PipelineEvent::VolumeCompleted {
                    stage: PipelineStage::Upload,
                    volume,
                    files: *files,
                });
            }
            Err(e) => {
                warn!(volume, error = %e, "Volume upload failed");
                self.emit(PipelineEvent::VolumeFailed {
                    stage: PipelineStage::Upload,
                    volume,
                    message: e.to_string(),
                });
            }
        }
        result
    }

    async fn upload_volume_inner(&self, job: &UploadJob) -> Result<u64> {
        let volume = job.volume_number;
        let local_dir = job.local_dir.clone();
        let files = tokio::task::spawn_blocking(move || discovery::list_files(&local_dir))
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))??;
        if files.is_empty() {
            return Err(PipelineError::NoFiles {
                path: job.local_dir.clone(),
            });
        }

        let total = files.len() as u64;
        self.emit(PipelineEvent::VolumeStarted {
            stage: PipelineStage::Upload,
            volume,
            files: total,
        });

        for (index, path) in files.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let key = naming::object_key(&self.slug, volume, &name);

            let body = tokio::fs::read(path)
                .await
                .map_err(|e| PipelineError::io(path, e))?;

            self.storage
                .put(
                    &key,
                    Bytes::from(body),
                    content_type_for(path),
                    IMMUTABLE_CACHE_CONTROL,
                )
                .await
                .map_err(|e| PipelineError::Upload {
                    key: key.clone(),
                    message: e.to_string(),
                })?;

            debug!(volume, key = %key, "Uploaded");
            self.emit(PipelineEvent::FileProcessed {
                stage: PipelineStage::Upload,
                volume,
                index: index as u64 + 1,
                total,
                name,
            });
        }

        Ok(total)
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Pipeline(event)).ok();
        }
    }
}
