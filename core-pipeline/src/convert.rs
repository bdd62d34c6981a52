//! # Conversion Pipeline
//!
//! Re-encodes each volume's source images into the archive codec.
//!
//! ## Workflow
//!
//! For every volume, in its own pool job:
//! 1. Recursively discover `png`/`jpg`/`jpeg` files and sort them by path
//! 2. Decode and re-encode each file, one at a time, on the blocking pool
//! 3. Write it to `{output_base}/volume-NNN/NNN.{ext}` by position
//!
//! A volume with no images fails with `NoImages`. The first encode or write
//! error aborts that volume; files already written stay on disk. Other volumes
//! carry on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use core_runtime::events::{CoreEvent, EventBus, PipelineEvent, PipelineStage};
use core_sync::naming;
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

use crate::discovery;
use crate::error::{PipelineError, Result};
use crate::pool::{VolumeResult, VolumeTaskPool};

/// Default encoder quality
pub const DEFAULT_QUALITY: u8 = 85;

/// Default number of concurrent volume jobs
pub const DEFAULT_WORKERS: usize = 4;

/// Encodes decoded images into the target codec
pub trait ImageEncoder: Send + Sync {
    /// Extension of produced files, without the dot
    fn extension(&self) -> &'static str;

    /// Encode `image` at `quality` (1..=100)
    fn encode(&self, image: &DynamicImage, quality: u8) -> std::result::Result<Vec<u8>, String>;
}

/// libwebp compression effort, 0 (fast) ..= 6 (smallest output)
pub const DEFAULT_WEBP_METHOD: u8 = 6;

/// Lossy WebP via libwebp
#[derive(Debug, Clone, Copy)]
pub struct WebpEncoder {
    method: u8,
}

impl Default for WebpEncoder {
    fn default() -> Self {
        Self {
            method: DEFAULT_WEBP_METHOD,
        }
    }
}

impl WebpEncoder {
    pub fn with_method(method: u8) -> Self {
        Self {
            method: method.min(6),
        }
    }

    pub fn method(&self) -> u8 {
        self.method
    }

    fn config(&self, quality: u8) -> std::result::Result<webp::WebPConfig, String> {
        let mut config = webp::WebPConfig::new()
            .map_err(|_| "Failed to initialize WebP encoder config".to_string())?;
        config.lossless = 0;
        config.quality = f32::from(quality.clamp(1, 100));
        config.method = i32::from(self.method);
        Ok(config)
    }
}

impl ImageEncoder for WebpEncoder {
    fn extension(&self) -> &'static str {
        "webp"
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> std::result::Result<Vec<u8>, String> {
        // libwebp only accepts 8-bit RGB(A)
        let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
        let encoder = webp::Encoder::from_image(&rgba).map_err(|e| e.to_string())?;
        let memory = encoder
            .encode_advanced(&self.config(quality)?)
            .map_err(|e| format!("WebP encoding failed: {:?}", e))?;
        Ok(memory.to_vec())
    }
}

/// One volume to convert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub volume_number: u32,
    pub source_dir: PathBuf,
}

impl ConversionJob {
    pub fn new(volume_number: u32, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            volume_number,
            source_dir: source_dir.into(),
        }
    }
}

/// Conversion Pipeline
#[derive(Clone)]
pub struct ConversionPipeline {
    encoder: Arc<dyn ImageEncoder>,
    output_base: PathBuf,
    quality: u8,
    workers: usize,
    event_bus: Option<EventBus>,
}

impl ConversionPipeline {
    pub fn new(output_base: impl Into<PathBuf>) -> Self {
        Self {
            encoder: Arc::new(WebpEncoder::default()),
            output_base: output_base.into(),
            quality: DEFAULT_QUALITY,
            workers: DEFAULT_WORKERS,
            event_bus: None,
        }
    }

    /// Clamped to 1..=100.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn output_base(&self) -> &Path {
        &self.output_base
    }

    /// Directory a volume's converted files are written to
    pub fn volume_output_dir(&self, volume: u32) -> PathBuf {
        self.output_base.join(naming::volume_folder_name(volume))
    }

    /// Convert every job; results are ascending by volume number.
    #[instrument(skip(self, jobs), fields(volumes = jobs.len(), workers = self.workers))]
    pub async fn run(&self, jobs: &[ConversionJob]) -> Vec<VolumeResult<u64>> {
        let mut pool = VolumeTaskPool::new(self.workers);
        for job in jobs {
            let pipeline = self.clone();
            let job = job.clone();
            pool.submit(job.volume_number, async move {
                pipeline.convert_volume(job).await
            });
        }

        let results = pool.join().await;
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(
            volumes = results.len(),
            failed,
            "Conversion finished"
        );
        results
    }

    /// Converted files already present for `volume`, for runs that skip
    /// conversion
    pub fn count_converted(&self, volume: u32) -> Result<u64> {
        discovery::count_files_with_extension(
            &self.volume_output_dir(volume),
            self.encoder.extension(),
        )
    }

    async fn convert_volume(&self, job: ConversionJob) -> Result<u64> {
        let volume = job.volume_number;
        let result = self.convert_volume_inner(&job).await;

        match &result {
            Ok(files) => {
                info!(volume, files, "Volume converted");
                self.emit(PipelineEvent::VolumeCompleted {
                    stage: PipelineStage::Convert,
                    volume,
                    files: *files,
                });
            }
            Err(e) => {
                warn!(volume, error = %e, "Volume conversion failed");
                self.emit(PipelineEvent::VolumeFailed {
                    stage: PipelineStage::Convert,
                    volume,
                    message: e.to_string(),
                });
            }
        }
        result
    }

    async fn convert_volume_inner(&self, job: &ConversionJob) -> Result<u64> {
        let volume = job.volume_number;
        let source_dir = job.source_dir.clone();
        let images = tokio::task::spawn_blocking(move || discovery::discover_images(&source_dir))
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))??;

        if images.is_empty() {
            return Err(PipelineError::NoImages {
                path: job.source_dir.clone(),
            });
        }

        let total = images.len() as u64;
        self.emit(PipelineEvent::VolumeStarted {
            stage: PipelineStage::Convert,
            volume,
            files: total,
        });

        let output_dir = self.volume_output_dir(volume);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| PipelineError::io(&output_dir, e))?;

        for (index, source) in images.into_iter().enumerate() {
            let position = index as u32 + 1;
            let name = naming::page_file_name(position, self.encoder.extension());
            let target = output_dir.join(&name);

            let encoder = self.encoder.clone();
            let quality = self.quality;
            let encoded = tokio::task::spawn_blocking(move || encode_file(&*encoder, &source, quality))
                .await
                .map_err(|e| PipelineError::Join(e.to_string()))??;

            tokio::fs::write(&target, encoded)
                .await
                .map_err(|e| PipelineError::io(&target, e))?;

            debug!(volume, file = %name, "Converted");
            self.emit(PipelineEvent::FileProcessed {
                stage: PipelineStage::Convert,
                volume,
                index: u64::from(position),
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

fn encode_file(encoder: &dyn ImageEncoder, source: &Path, quality: u8) -> Result<Vec<u8>> {
    let image = image::open(source).map_err(|e| PipelineError::Encode {
        path: source.to_path_buf(),
        message: e.to_string(),
    })?;

    encoder
        .encode(&image, quality)
        .map_err(|message| PipelineError::Encode {
            path: source.to_path_buf(),
            message,
        })
}
