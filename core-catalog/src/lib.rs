//! # Catalog
//!
//! Series and volume records for the archive, backed by SQLite via `sqlx`.
//!
//! ## Overview
//!
//! - [`models`] - `Series`, `Volume` and the inputs used to create/update them
//! - [`repository`] - `CatalogRepository` trait and `SqliteCatalogRepository`
//! - [`db`] - connection pool creation and embedded migrations
//!
//! Volume numbers are unique within a series (enforced by a unique index);
//! inserting an existing one yields `CatalogError::Duplicate`, which callers
//! treat as "already done" rather than as a failure.

pub mod db;
pub mod error;
pub mod models;
pub mod repository;

pub use error::{CatalogError, Result};
pub use models::{
    NewSeries, NewVolume, Series, SeriesStatus, SeriesSummary, SeriesWithVolumes, Volume,
    VolumeUpdate,
};
pub use repository::{CatalogRepository, SqliteCatalogRepository};
