//! Catalog domain models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// Publication status of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    #[default]
    Ongoing,
    Completed,
}

impl SeriesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ongoing" => Ok(Self::Ongoing),
            "completed" => Ok(Self::Completed),
            other => Err(CatalogError::InvalidInput {
                field: "status".to_string(),
                message: format!("unknown series status '{}'", other),
            }),
        }
    }
}

/// A series record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    /// Stable, globally unique key; immutable once created
    pub slug: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub total_volumes: u32,
    pub status: SeriesStatus,
    pub created_at: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct SeriesRow {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub total_volumes: u32,
    pub status: String,
    pub created_at: i64,
}

impl TryFrom<SeriesRow> for Series {
    type Error = CatalogError;

    fn try_from(row: SeriesRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse()?,
            id: row.id,
            slug: row.slug,
            title: row.title,
            cover_url: row.cover_url,
            total_volumes: row.total_volumes,
            created_at: row.created_at,
        })
    }
}

/// A volume record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Volume {
    pub id: String,
    pub series_id: String,
    pub volume_number: u32,
    pub page_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A series with all of its volume records, ordered by volume number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesWithVolumes {
    pub series: Series,
    pub volumes: Vec<Volume>,
}

impl SeriesWithVolumes {
    /// `volume_number -> page_count`
    pub fn page_counts(&self) -> BTreeMap<u32, u32> {
        self.volumes
            .iter()
            .map(|v| (v.volume_number, v.page_count))
            .collect()
    }
}

/// A series and how many volume records it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
    pub series: Series,
    pub volume_count: u32,
}

/// Input for creating a series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSeries {
    pub slug: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub total_volumes: u32,
    pub status: SeriesStatus,
}

impl NewSeries {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            cover_url: None,
            total_volumes: 0,
            status: SeriesStatus::default(),
        }
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn with_total_volumes(mut self, total: u32) -> Self {
        self.total_volumes = total;
        self
    }

    pub fn with_status(mut self, status: SeriesStatus) -> Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.slug.trim().is_empty() {
            return Err("slug cannot be empty".to_string());
        }
        if self.slug.contains('/') {
            return Err("slug cannot contain '/'".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Input for adding a volume record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVolume {
    pub series_id: String,
    pub volume_number: u32,
    pub page_count: u32,
}

impl NewVolume {
    pub fn new(series_id: impl Into<String>, volume_number: u32, page_count: u32) -> Self {
        Self {
            series_id: series_id.into(),
            volume_number,
            page_count,
        }
    }
}

/// Input for changing a volume's page count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeUpdate {
    pub series_id: String,
    pub volume_number: u32,
    pub page_count: u32,
}

impl VolumeUpdate {
    pub fn new(series_id: impl Into<String>, volume_number: u32, page_count: u32) -> Self {
        Self {
            series_id: series_id.into(),
            volume_number,
            page_count,
        }
    }
}
