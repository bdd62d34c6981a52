//! # Publish Pipeline
//!
//! Turns local source images into published archive volumes.
//!
//! ## Overview
//!
//! - [`discovery`] - finding source images, volume folders and output files
//! - [`convert`] - parallel per-volume re-encoding (`ConversionPipeline`)
//! - [`upload`] - parallel per-volume publishing (`UploadPipeline`)
//! - [`pool`] - the bounded `VolumeTaskPool` both pipelines run on
//!
//! One volume is one unit of work. Files inside a volume are processed in
//! order; volumes run concurrently up to the configured worker count and fail
//! independently of each other.

pub mod convert;
pub mod discovery;
pub mod error;
pub mod pool;
pub mod upload;

pub use convert::{ConversionJob, ConversionPipeline, ImageEncoder, WebpEncoder};
pub use discovery::{discover_images, discover_volume_dirs, LocalVolume};
pub use error::{PipelineError, Result};
pub use pool::{VolumeResult, VolumeTaskPool};
pub use upload::{content_type_for, UploadJob, UploadPipeline, IMMUTABLE_CACHE_CONTROL};
