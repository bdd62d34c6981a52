use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No images found in {}", path.display())]
    NoImages { path: PathBuf },

    #[error("No files found in {}", path.display())]
    NoFiles { path: PathBuf },

    #[error("Failed to encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    #[error("Failed to upload {key}: {message}")]
    Upload { key: String, message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Volume job aborted: {0}")]
    Join(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self::Io {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
