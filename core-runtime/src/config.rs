//! # Archive Configuration Module
//!
//! Provides configuration management for the archive tooling.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `ArchiveConfig` holding connection settings for the bucket and the catalog
//! database plus pipeline tuning. Validation is fail-fast: nothing touches
//! storage or the database until a complete, valid configuration exists.
//!
//! ## Required Settings
//!
//! - `StorageSettings` - S3-compatible endpoint, credentials and bucket
//! - `CatalogSettings` - Database URL
//!
//! ## Optional Settings (with defaults)
//!
//! - CDN base URL for cover references (default: none, covers use the key)
//! - Codec quality (default: 85)
//! - Worker count (default: 4)
//! - Output root for converted files (default: `./output`)
//! - Apply failure threshold (default: 3)
//!
//! ## Usage
//!
//! ### From the environment
//!
//! ```ignore
//! use core_runtime::config::ArchiveConfig;
//!
//! // Reads `.env` when present, then the process environment
//! let config = ArchiveConfig::from_env()?;
//! ```
//!
//! ### Programmatic
//!
//! ```ignore
//! use core_runtime::config::{ArchiveConfig, CatalogSettings, StorageSettings};
//!
//! let config = ArchiveConfig::builder()
//!     .storage(StorageSettings::new("https://r2.example.com", "key", "secret"))
//!     .catalog(CatalogSettings::new("sqlite://archive.db"))
//!     .quality(80)
//!     .workers(8)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::{redact_if_sensitive, LogFormat, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_STORAGE_ENDPOINT: &str = "ARCHIVE_STORAGE_ENDPOINT";
pub const ENV_STORAGE_ACCESS_KEY_ID: &str = "ARCHIVE_STORAGE_ACCESS_KEY_ID";
pub const ENV_STORAGE_SECRET_ACCESS_KEY: &str = "ARCHIVE_STORAGE_SECRET_ACCESS_KEY";
pub const ENV_STORAGE_BUCKET: &str = "ARCHIVE_STORAGE_BUCKET";
pub const ENV_STORAGE_REGION: &str = "ARCHIVE_STORAGE_REGION";
pub const ENV_DATABASE_URL: &str = "ARCHIVE_DATABASE_URL";
pub const ENV_CDN_BASE: &str = "ARCHIVE_CDN_BASE";
pub const ENV_QUALITY: &str = "ARCHIVE_QUALITY";
pub const ENV_WORKERS: &str = "ARCHIVE_WORKERS";
pub const ENV_OUTPUT_ROOT: &str = "ARCHIVE_OUTPUT_ROOT";
pub const ENV_LOG_LEVEL: &str = "ARCHIVE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "ARCHIVE_LOG_FORMAT";

pub const DEFAULT_BUCKET: &str = "archive";
pub const DEFAULT_REGION: &str = "auto";
pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_OUTPUT_ROOT: &str = "./output";
pub const DEFAULT_FAILURE_THRESHOLD: usize = 3;

// ============================================================================
// Settings groups
// ============================================================================

/// Connection settings for the object storage bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
}

impl StorageSettings {
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("endpoint", &self.endpoint)
            .field(
                "access_key_id",
                &redact_if_sensitive("access_key_id", &self.access_key_id),
            )
            .field(
                "secret_access_key",
                &redact_if_sensitive("secret_access_key", &self.secret_access_key),
            )
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

/// Catalog database settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    /// sqlx connection URL (e.g. `sqlite://archive.db`)
    pub database_url: String,
    /// Maximum pool connections
    pub max_connections: u32,
}

impl CatalogSettings {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
        }
    }
}

/// Tuning for the convert/upload pipelines and the mutation applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Lossy codec quality, 1..=100
    pub quality: u8,
    /// Concurrent volume jobs
    pub workers: usize,
    /// Root under which `{slug}/volume-NNN/` output folders are written
    pub output_root: PathBuf,
    /// Apply failures tolerated before the run halts
    pub failure_threshold: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            workers: DEFAULT_WORKERS,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl PipelineSettings {
    /// Output directory for one series
    pub fn output_dir(&self, slug: &str) -> PathBuf {
        self.output_root.join(slug)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(Error::Config(format!(
                "Quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config(
                "Worker count must be at least 1".to_string(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(Error::Config(
                "Failure threshold must be at least 1".to_string(),
            ));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(Error::Config("Output root cannot be empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// ArchiveConfig
// ============================================================================

/// Complete configuration for the archive tooling.
///
/// Use [`ArchiveConfig::builder`] or [`ArchiveConfig::from_env`] to construct.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub storage: StorageSettings,
    pub catalog: CatalogSettings,
    pub pipeline: PipelineSettings,
    /// Public base URL the bucket is served from
    pub cdn_base: Option<String>,
    pub logging: LoggingConfig,
}

impl ArchiveConfig {
    /// Creates a new builder for constructing an `ArchiveConfig`.
    pub fn builder() -> ArchiveConfigBuilder {
        ArchiveConfigBuilder::default()
    }

    /// Load configuration from `.env` (if present) and the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming every missing required variable, or the
    /// first variable that fails to parse.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("Failed to read .env file: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a `.env` style file at `path` only.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let vars: Vec<(String, String)> = dotenvy::from_path_iter(path.as_ref())
            .map_err(|e| {
                Error::Config(format!(
                    "Failed to read {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Config(format!("Invalid env file entry: {}", e)))?;

        Self::from_lookup(|key| {
            vars.iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        })
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let required = [
            ENV_STORAGE_ENDPOINT,
            ENV_STORAGE_ACCESS_KEY_ID,
            ENV_STORAGE_SECRET_ACCESS_KEY,
            ENV_DATABASE_URL,
        ];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let value = |key: &str| get(key).unwrap_or_default();

        let mut storage = StorageSettings::new(
            value(ENV_STORAGE_ENDPOINT),
            value(ENV_STORAGE_ACCESS_KEY_ID),
            value(ENV_STORAGE_SECRET_ACCESS_KEY),
        );
        if let Some(bucket) = get(ENV_STORAGE_BUCKET) {
            storage = storage.with_bucket(bucket);
        }
        if let Some(region) = get(ENV_STORAGE_REGION) {
            storage = storage.with_region(region);
        }

        let mut builder = ArchiveConfig::builder()
            .storage(storage)
            .catalog(CatalogSettings::new(value(ENV_DATABASE_URL)));

        if let Some(cdn) = get(ENV_CDN_BASE) {
            builder = builder.cdn_base(cdn);
        }
        if let Some(quality) = get(ENV_QUALITY) {
            builder = builder.quality(parse_var(ENV_QUALITY, &quality)?);
        }
        if let Some(workers) = get(ENV_WORKERS) {
            builder = builder.workers(parse_var(ENV_WORKERS, &workers)?);
        }
        if let Some(root) = get(ENV_OUTPUT_ROOT) {
            builder = builder.output_root(root);
        }

        let mut logging = LoggingConfig::default();
        if let Some(level) = get(ENV_LOG_LEVEL) {
            logging = logging.with_level(
                level
                    .parse()
                    .map_err(|e| Error::Config(format!("{}: {}", ENV_LOG_LEVEL, e)))?,
            );
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            logging = logging.with_format(format.parse::<LogFormat>()?);
        }

        builder.logging(logging).build()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            return Err(Error::Config("Storage bucket cannot be empty".to_string()));
        }
        if self.catalog.database_url.trim().is_empty() {
            return Err(Error::Config("Database URL cannot be empty".to_string()));
        }
        if self.catalog.max_connections == 0 {
            return Err(Error::Config(
                "Database pool needs at least one connection".to_string(),
            ));
        }
        if let Some(cdn) = &self.cdn_base {
            if !(cdn.starts_with("http://") || cdn.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "CDN base must be an http(s) URL, got '{}'",
                    cdn
                )));
            }
        }
        self.pipeline.validate()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e)))
}

/// Builder for constructing [`ArchiveConfig`] instances.
#[derive(Debug, Default)]
pub struct ArchiveConfigBuilder {
    storage: Option<StorageSettings>,
    catalog: Option<CatalogSettings>,
    pipeline: PipelineSettings,
    cdn_base: Option<String>,
    logging: Option<LoggingConfig>,
}

impl ArchiveConfigBuilder {
    pub fn storage(mut self, storage: StorageSettings) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn catalog(mut self, catalog: CatalogSettings) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Public base URL; a trailing slash is dropped.
    pub fn cdn_base(mut self, cdn_base: impl Into<String>) -> Self {
        self.cdn_base = Some(cdn_base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.pipeline.quality = quality;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.pipeline.workers = workers;
        self
    }

    pub fn output_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.pipeline.output_root = root.into();
        self
    }

    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.pipeline.failure_threshold = threshold;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if storage or catalog settings are missing or
    /// any value is out of range.
    pub fn build(self) -> Result<ArchiveConfig> {
        let storage = self.storage.ok_or_else(|| {
            Error::Config("Storage settings are required. Use .storage() to set them.".to_string())
        })?;
        let catalog = self.catalog.ok_or_else(|| {
            Error::Config("Catalog settings are required. Use .catalog() to set them.".to_string())
        })?;

        let config = ArchiveConfig {
            storage,
            catalog,
            pipeline: self.pipeline,
            cdn_base: self.cdn_base,
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
