//! Archive service façade and bootstrap helpers.
//!
//! This crate wires host-provided clients (object storage, catalog) into the
//! reconcile, registration and publish flows. Desktop hosts typically enable
//! the `desktop-shims` feature, which builds an S3-compatible store and a
//! SQLite catalog from an `ArchiveConfig`.

pub mod error;
pub mod publish;

pub use error::{Result, ServiceError};
pub use publish::{PublishReport, PublishRequest, PublishedVolume};

use std::sync::Arc;

use bridge_traits::prompt::{OptionSelector, Selection};
use bridge_traits::storage::ObjectStorage;
use core_catalog::{CatalogRepository, Series, SeriesSummary};
use core_runtime::events::{EventBus, EventStream};
use core_runtime::PipelineSettings;
use core_sync::{
    ApplyPolicy, BucketInventory, MutationApplier, ReconcileCoordinator, ReconcileReport,
    RegistrationReport, SeriesDetails, SeriesRegistrar,
};
use tracing::{debug, info};

/// Aggregated handle to the clients the flows require.
pub struct CoreDependencies {
    pub storage: Arc<dyn ObjectStorage>,
    pub catalog: Arc<dyn CatalogRepository>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit client handles.
    pub fn new(storage: Arc<dyn ObjectStorage>, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { storage, catalog }
    }
}

/// Outcome of [`ArchiveService::select_series_slug`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugSelection {
    Selected(String),
    Cancelled,
}

/// Outcome of [`ArchiveService::select_existing_series`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesSelection {
    Selected(SeriesSummary),
    Cancelled,
    /// The catalog has no series to choose from
    Empty,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct ArchiveService {
    deps: Arc<CoreDependencies>,
    settings: PipelineSettings,
    cdn_base: Option<String>,
    event_bus: EventBus,
}

impl ArchiveService {
    /// Create a new service from the provided dependencies.
    pub fn new(deps: CoreDependencies, settings: PipelineSettings) -> Self {
        Self {
            deps: Arc::new(deps),
            settings,
            cdn_base: None,
            event_bus: EventBus::default(),
        }
    }

    /// Public base URL used for default cover references
    pub fn with_cdn_base(mut self, cdn_base: impl Into<String>) -> Self {
        self.cdn_base = Some(cdn_base.into());
        self
    }

    /// Access the client dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to pipeline and reconcile progress events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    fn applier(&self) -> MutationApplier {
        MutationApplier::new(self.deps.catalog.clone())
            .with_failure_threshold(self.settings.failure_threshold)
            .with_event_bus(self.event_bus.clone())
    }

    pub(crate) fn registrar(&self) -> SeriesRegistrar {
        let registrar = SeriesRegistrar::new(self.deps.storage.clone(), self.deps.catalog.clone())
            .with_applier(self.applier());
        match &self.cdn_base {
            Some(base) => registrar.with_cdn_base(base.clone()),
            None => registrar,
        }
    }

    /// Diff bucket against catalog for `slug` and apply per `policy`.
    pub async fn reconcile(&self, slug: &str, policy: &ApplyPolicy) -> Result<ReconcileReport> {
        let coordinator =
            ReconcileCoordinator::new(self.deps.storage.clone(), self.deps.catalog.clone())
                .with_failure_threshold(self.settings.failure_threshold)
                .with_event_bus(self.event_bus.clone());

        Ok(coordinator.reconcile(slug, policy).await?)
    }

    /// Create or extend the `slug` series from what is in the bucket.
    pub async fn register_series(
        &self,
        slug: &str,
        details: &SeriesDetails,
        policy: &ApplyPolicy,
    ) -> Result<RegistrationReport> {
        Ok(self
            .registrar()
            .register_from_bucket(slug, details, policy)
            .await?)
    }

    /// Let the user pick an existing series folder or create `default_slug`.
    ///
    /// `default_slug` is always the first option: marked as the default when
    /// the bucket already has it, otherwise offered as a new folder.
    pub async fn select_series_slug(
        &self,
        selector: &dyn OptionSelector,
        default_slug: &str,
    ) -> Result<SlugSelection> {
        let existing = BucketInventory::new(self.deps.storage.clone())
            .list_series_slugs()
            .await?;

        let first = if existing.iter().any(|s| s == default_slug) {
            format!("{} [default]", default_slug)
        } else {
            format!("[Create new: {}]", default_slug)
        };

        let mut slugs = vec![default_slug.to_string()];
        slugs.extend(existing.into_iter().filter(|s| s != default_slug));

        let mut options = vec![first];
        options.extend(slugs.iter().skip(1).cloned());

        let selection = match selector.select("Select series folder", &options, 0) {
            Selection::Chosen(index) => slugs
                .get(index)
                .cloned()
                .map(SlugSelection::Selected)
                .unwrap_or(SlugSelection::Cancelled),
            Selection::Cancelled => SlugSelection::Cancelled,
        };

        debug!(?selection, "Series folder selection");
        Ok(selection)
    }

    /// Let the user pick a catalogued series to append volumes to.
    pub async fn select_existing_series(
        &self,
        selector: &dyn OptionSelector,
    ) -> Result<SeriesSelection> {
        let mut summaries = self.deps.catalog.list_series_with_volume_counts().await?;
        if summaries.is_empty() {
            info!("No series in catalog");
            return Ok(SeriesSelection::Empty);
        }

        let options: Vec<String> = summaries.iter().map(series_label).collect();
        let selection = match selector.select("Select series to append to", &options, 0) {
            Selection::Chosen(index) if index < summaries.len() => {
                SeriesSelection::Selected(summaries.swap_remove(index))
            }
            _ => SeriesSelection::Cancelled,
        };

        debug!(?selection, "Series selection");
        Ok(selection)
    }

    /// All catalogued series ordered by slug.
    pub async fn list_series(&self) -> Result<Vec<Series>> {
        Ok(self.deps.catalog.list_series().await?)
    }

    /// All catalogued series with their volume record counts.
    pub async fn list_series_with_volume_counts(&self) -> Result<Vec<SeriesSummary>> {
        Ok(self.deps.catalog.list_series_with_volume_counts().await?)
    }
}

fn series_label(summary: &SeriesSummary) -> String {
    let count = summary.volume_count;
    format!(
        "{} (slug: {}, {} volume{})",
        summary.series.title,
        summary.series.slug,
        count,
        if count == 1 { "" } else { "s" }
    )
}

/// Convenience bootstrapper for desktop hosts.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::ArchiveConfig;
/// use core_service::bootstrap_desktop;
///
/// let config = ArchiveConfig::from_env()?;
/// let service = bootstrap_desktop(&config).await?;
/// let series = service.list_series().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    config: &core_runtime::ArchiveConfig,
) -> Result<ArchiveService> {
    use bridge_desktop::{ObjectStoreStorage, S3Options};
    use core_catalog::db::{create_pool, DatabaseConfig};
    use core_catalog::SqliteCatalogRepository;

    let storage = ObjectStoreStorage::s3(&S3Options {
        endpoint: config.storage.endpoint.clone(),
        region: config.storage.region.clone(),
        bucket: config.storage.bucket.clone(),
        access_key_id: config.storage.access_key_id.clone(),
        secret_access_key: config.storage.secret_access_key.clone(),
    })
    .map_err(|err| ServiceError::InitializationFailed(err.to_string()))?;

    let pool = create_pool(
        DatabaseConfig::from_url(config.catalog.database_url.clone())
            .max_connections(config.catalog.max_connections),
    )
    .await?;

    info!(bucket = %config.storage.bucket, "Archive service ready");

    let deps = CoreDependencies::new(
        Arc::new(storage),
        Arc::new(SqliteCatalogRepository::new(pool)),
    );
    let service = ArchiveService::new(deps, config.pipeline.clone());
    Ok(match &config.cdn_base {
        Some(base) => service.with_cdn_base(base.clone()),
        None => service,
    })
}
