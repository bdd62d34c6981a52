//! Catalog repository trait and SQLite implementation

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::models::{
    NewSeries, NewVolume, Series, SeriesRow, SeriesSummary, SeriesWithVolumes, Volume,
    VolumeUpdate,
};

const SERIES_COLUMNS: &str =
    "id, slug, title, cover_url, total_volumes, status, created_at";

/// Catalog data access
///
/// Lookups return `Ok(None)` for absent records so callers can tell "not
/// there" apart from a failed query.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Find a series and all of its volumes by slug
    async fn get_series_by_slug(&self, slug: &str) -> Result<Option<SeriesWithVolumes>>;

    /// All series ordered by slug
    async fn list_series(&self) -> Result<Vec<Series>>;

    /// All series with the number of volume records each owns
    async fn list_series_with_volume_counts(&self) -> Result<Vec<SeriesSummary>>;

    /// Insert a series and return its id
    ///
    /// # Errors
    /// - `CatalogError::Duplicate` if the slug is taken
    /// - `CatalogError::InvalidInput` if validation fails
    async fn create_series(&self, series: &NewSeries) -> Result<String>;

    /// Insert a volume record and return its id
    ///
    /// # Errors
    /// - `CatalogError::Duplicate` if the volume number already exists for the series
    /// - `CatalogError::NotFound` if the series does not exist
    async fn add_volume(&self, volume: &NewVolume) -> Result<String>;

    /// Set a volume's page count
    ///
    /// # Errors
    /// - `CatalogError::NotFound` if the volume does not exist
    /// - `CatalogError::Unsupported` if the backend cannot update volumes
    async fn update_volume_page_count(&self, update: &VolumeUpdate) -> Result<()>;
}

/// SQLite implementation of CatalogRepository
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn volumes_for(&self, series_id: &str) -> Result<Vec<Volume>> {
        let volumes = query_as::<_, Volume>(
            r#"
            SELECT id, series_id, volume_number, page_count, created_at, updated_at
            FROM volumes
            WHERE series_id = ?
            ORDER BY volume_number
            "#,
        )
        .bind(series_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(volumes)
    }
}

/// Translate constraint violations into catalog signals.
fn map_write_error(e: sqlx::Error, entity_type: &str, key: &str) -> CatalogError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return CatalogError::duplicate(entity_type, key);
        }
        if db_err.is_foreign_key_violation() {
            return CatalogError::not_found("Series", key);
        }
    }
    CatalogError::Database(e)
}

#[derive(FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    series: SeriesRow,
    volume_count: i64,
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn get_series_by_slug(&self, slug: &str) -> Result<Option<SeriesWithVolumes>> {
        let row = query_as::<_, SeriesRow>(&format!(
            "SELECT {} FROM series WHERE slug = ?",
            SERIES_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let series = Series::try_from(row)?;
        let volumes = self.volumes_for(&series.id).await?;

        Ok(Some(SeriesWithVolumes { series, volumes }))
    }

    async fn list_series(&self) -> Result<Vec<Series>> {
        query_as::<_, SeriesRow>(&format!(
            "SELECT {} FROM series ORDER BY slug",
            SERIES_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Series::try_from)
        .collect()
    }

    async fn list_series_with_volume_counts(&self) -> Result<Vec<SeriesSummary>> {
        let rows = query_as::<_, SummaryRow>(
            r#"
            SELECT s.id, s.slug, s.title, s.cover_url, s.total_volumes, s.status, s.created_at,
                   COUNT(v.id) AS volume_count
            FROM series s
            LEFT JOIN volumes v ON v.series_id = s.id
            GROUP BY s.id
            ORDER BY s.slug
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SeriesSummary {
                    volume_count: u32::try_from(row.volume_count).unwrap_or(u32::MAX),
                    series: Series::try_from(row.series)?,
                })
            })
            .collect()
    }

    async fn create_series(&self, series: &NewSeries) -> Result<String> {
        series.validate().map_err(|message| CatalogError::InvalidInput {
            field: "Series".to_string(),
            message,
        })?;

        let id = Uuid::new_v4().to_string();
        query(
            r#"
            INSERT INTO series (id, slug, title, cover_url, total_volumes, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&series.slug)
        .bind(&series.title)
        .bind(&series.cover_url)
        .bind(series.total_volumes)
        .bind(series.status.as_str())
        .bind(self.clock.unix_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Series", &series.slug))?;

        debug!(slug = %series.slug, id = %id, "Created series");
        Ok(id)
    }

    async fn add_volume(&self, volume: &NewVolume) -> Result<String> {
        if volume.volume_number == 0 {
            return Err(CatalogError::InvalidInput {
                field: "volume_number".to_string(),
                message: "volume numbers start at 1".to_string(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let now = self.clock.unix_timestamp();
        let key = format!("{}#{}", volume.series_id, volume.volume_number);

        query(
            r#"
            INSERT INTO volumes (id, series_id, volume_number, page_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&volume.series_id)
        .bind(volume.volume_number)
        .bind(volume.page_count)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Volume", &key))?;

        debug!(
            series_id = %volume.series_id,
            volume = volume.volume_number,
            pages = volume.page_count,
            "Added volume"
        );
        Ok(id)
    }

    async fn update_volume_page_count(&self, update: &VolumeUpdate) -> Result<()> {
        let result = query(
            r#"
            UPDATE volumes
            SET page_count = ?, updated_at = ?
            WHERE series_id = ? AND volume_number = ?
            "#,
        )
        .bind(update.page_count)
        .bind(self.clock.unix_timestamp())
        .bind(&update.series_id)
        .bind(update.volume_number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found(
                "Volume",
                format!("{}#{}", update.series_id, update.volume_number),
            ));
        }

        debug!(
            series_id = %update.series_id,
            volume = update.volume_number,
            pages = update.page_count,
            "Updated volume page count"
        );
        Ok(())
    }
}
