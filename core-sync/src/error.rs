use bridge_traits::BridgeError;
use core_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Series '{slug}' not found in catalog")]
    SeriesNotFound { slug: String },

    #[error("No volumes found in bucket for series '{slug}'")]
    NoVolumesInBucket { slug: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        SyncError::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
