use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] core_pipeline::PipelineError),

    #[error("No volume folders found in {}", path.display())]
    NoLocalVolumes { path: PathBuf },

    #[error("Volume {volume} not found in {}", path.display())]
    VolumeNotFound { volume: u32, path: PathBuf },

    #[error("Conversion failed for volume(s) {volumes:?}")]
    ConversionFailed { volumes: Vec<u32> },

    #[error("Upload failed for volume(s) {volumes:?}")]
    UploadFailed { volumes: Vec<u32> },
}

pub type Result<T> = std::result::Result<T, ServiceError>;
