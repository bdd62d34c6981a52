//! Local filesystem discovery: source images, volume folders and
//! files ready for upload.

use std::path::{Path, PathBuf};

use core_sync::naming::VolumeNameParser;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// Source raster formats picked up for conversion
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// A volume folder found under a local source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVolume {
    pub volume_number: u32,
    pub path: PathBuf,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Every image under `dir`, recursively, sorted by path
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        if entry.file_type().is_file() && has_extension(entry.path(), IMAGE_EXTENSIONS) {
            images.push(entry.into_path());
        }
    }

    images.sort();
    Ok(images)
}

/// First-level folders of `root` that parse as volumes, ascending by number
///
/// When two folders parse to the same number, the one that sorts first by
/// name is kept.
pub fn discover_volume_dirs(root: &Path, parser: &VolumeNameParser) -> Result<Vec<LocalVolume>> {
    let mut folders = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| PipelineError::io(root, e))?;
        if entry.file_type().is_dir() {
            folders.push(entry.into_path());
        }
    }
    folders.sort();

    let mut volumes: Vec<LocalVolume> = Vec::new();
    for path in folders {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(volume_number) = parser.parse(name) else {
            debug!(folder = %path.display(), "Skipping non-volume folder");
            continue;
        };

        if let Some(kept) = volumes.iter().find(|v| v.volume_number == volume_number) {
            warn!(
                volume = volume_number,
                kept = %kept.path.display(),
                ignored = %path.display(),
                "Duplicate volume folder"
            );
            continue;
        }
        volumes.push(LocalVolume {
            volume_number,
            path,
        });
    }

    volumes.sort_by_key(|v| v.volume_number);
    Ok(volumes)
}

/// Regular files directly inside `dir`, sorted by name
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Files in `dir` carrying `extension`; 0 when `dir` is missing
pub fn count_files_with_extension(dir: &Path, extension: &str) -> Result<u64> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let count = list_files(dir)?
        .iter()
        .filter(|path| has_extension(path, &[extension]))
        .count();
    Ok(count as u64)
}
