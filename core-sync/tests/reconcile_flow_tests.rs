//! Integration tests for bucket/catalog reconciliation
//!
//! These tests run the full flow against an in-memory object store and an
//! in-memory SQLite catalog:
//! - Dry run reports the change set without writing
//! - Confirmed apply adds and updates volumes
//! - Declined confirmation leaves the catalog untouched
//! - Registration creates or appends series from bucket contents
//! - Circuit breaker halts after repeated catalog failures

use async_trait::async_trait;
use bridge_desktop::ObjectStoreStorage;
use bridge_traits::prompt::FixedConfirmation;
use bridge_traits::storage::ObjectStorage;
use bytes::Bytes;
use core_catalog::{
    db::create_test_pool, CatalogError, CatalogRepository, NewSeries, NewVolume, Series,
    SeriesStatus, SeriesSummary, SeriesWithVolumes, SqliteCatalogRepository, VolumeUpdate,
};
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use core_sync::naming::{object_key, page_file_name};
use core_sync::{
    ApplyPolicy, ReconcileCoordinator, ReconcileOutcome, RegistrationOutcome, SeriesDetails,
    SeriesRegistrar, SyncError, VolumeDiff,
};
use mockall::mock;
use std::sync::Arc;

// ============================================================================
// Fixtures
// ============================================================================

async fn seed_bucket(storage: &ObjectStoreStorage, slug: &str, volumes: &[(u32, u32)]) {
    for &(volume, pages) in volumes {
        for page in 1..=pages {
            let key = object_key(slug, volume, &page_file_name(page, "webp"));
            storage
                .put(&key, Bytes::from_static(b"RIFF"), "image/webp", "no-cache")
                .await
                .unwrap();
        }
    }
}

async fn seed_catalog(
    repo: &SqliteCatalogRepository,
    slug: &str,
    volumes: &[(u32, u32)],
) -> String {
    let id = repo
        .create_series(&NewSeries::new(slug, slug.to_uppercase()))
        .await
        .unwrap();
    for &(volume, pages) in volumes {
        repo.add_volume(&NewVolume::new(&id, volume, pages))
            .await
            .unwrap();
    }
    id
}

async fn setup() -> (Arc<ObjectStoreStorage>, Arc<SqliteCatalogRepository>) {
    let storage = Arc::new(ObjectStoreStorage::in_memory());
    let pool = create_test_pool().await.unwrap();
    let repo = Arc::new(SqliteCatalogRepository::new(pool));
    (storage, repo)
}

async fn page_counts(repo: &SqliteCatalogRepository, slug: &str) -> Vec<(u32, u32)> {
    repo.get_series_by_slug(slug)
        .await
        .unwrap()
        .unwrap()
        .page_counts()
        .into_iter()
        .collect()
}

// ============================================================================
// Reconcile
// ============================================================================

#[tokio::test]
async fn test_dry_run_reports_without_writing() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "alpha", &[(1, 20), (2, 18), (3, 25)]).await;
    seed_catalog(&repo, "alpha", &[(1, 20), (2, 15)]).await;

    let coordinator = ReconcileCoordinator::new(storage, repo.clone());
    let report = coordinator
        .reconcile("alpha", &ApplyPolicy::DryRun)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::DryRun);
    assert_eq!(
        report.change_set.entries(),
        &[
            VolumeDiff::Match { volume: 1, page_count: 20 },
            VolumeDiff::Update { volume: 2, from: 15, to: 18 },
            VolumeDiff::Add { volume: 3, page_count: 25 },
        ]
    );
    assert_eq!(report.summary.matched, 1);
    assert_eq!(report.summary.added, 0);
    assert_eq!(page_counts(&repo, "alpha").await, vec![(1, 20), (2, 15)]);
}

#[tokio::test]
async fn test_confirmed_apply_updates_catalog() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "alpha", &[(1, 20), (2, 18), (3, 25)]).await;
    seed_catalog(&repo, "alpha", &[(1, 20), (2, 15)]).await;

    let coordinator = ReconcileCoordinator::new(storage, repo.clone());
    let policy = ApplyPolicy::Confirm(Arc::new(FixedConfirmation(true)));
    let report = coordinator.reconcile("alpha", &policy).await.unwrap();

    assert_eq!(report.summary.matched, 1);
    assert_eq!(report.summary.added, 1);
    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(
        page_counts(&repo, "alpha").await,
        vec![(1, 20), (2, 18), (3, 25)]
    );

    // Second run finds nothing to do
    let again = coordinator
        .reconcile("alpha", &ApplyPolicy::AutoApprove)
        .await
        .unwrap();
    assert_eq!(again.outcome, ReconcileOutcome::UpToDate);
    assert_eq!(again.summary.matched, 3);
}

#[tokio::test]
async fn test_declined_confirmation_writes_nothing() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "alpha", &[(1, 5)]).await;
    seed_catalog(&repo, "alpha", &[]).await;

    let coordinator = ReconcileCoordinator::new(storage, repo.clone());
    let policy = ApplyPolicy::Confirm(Arc::new(FixedConfirmation(false)));
    let report = coordinator.reconcile("alpha", &policy).await.unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Declined);
    assert!(page_counts(&repo, "alpha").await.is_empty());
}

#[tokio::test]
async fn test_orphans_are_reported_only() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "alpha", &[(1, 20)]).await;
    seed_catalog(&repo, "alpha", &[(1, 20), (5, 30)]).await;

    let report = ReconcileCoordinator::new(storage, repo.clone())
        .reconcile("alpha", &ApplyPolicy::AutoApprove)
        .await
        .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::UpToDate);
    assert_eq!(report.change_set.orphans(), vec![5]);
    assert_eq!(report.summary.orphaned, 1);
    assert_eq!(page_counts(&repo, "alpha").await, vec![(1, 20), (5, 30)]);
}

#[tokio::test]
async fn test_missing_series_is_not_found() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "ghost", &[(1, 1)]).await;

    let err = ReconcileCoordinator::new(storage, repo)
        .reconcile("ghost", &ApplyPolicy::DryRun)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::SeriesNotFound { slug } if slug == "ghost"));
}

#[tokio::test]
async fn test_empty_bucket_reports_orphans() {
    let (storage, repo) = setup().await;
    seed_catalog(&repo, "alpha", &[(1, 3), (2, 4)]).await;

    let report = ReconcileCoordinator::new(storage, repo)
        .reconcile("alpha", &ApplyPolicy::DryRun)
        .await
        .unwrap();
    assert_eq!(report.change_set.orphans(), vec![1, 2]);
}

#[tokio::test]
async fn test_events_emitted_during_apply() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "alpha", &[(1, 2)]).await;
    seed_catalog(&repo, "alpha", &[]).await;

    let bus = EventBus::new(32);
    let mut rx = bus.subscribe();
    ReconcileCoordinator::new(storage, repo)
        .with_event_bus(bus)
        .reconcile("alpha", &ApplyPolicy::AutoApprove)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(
        events.first(),
        Some(CoreEvent::Reconcile(ReconcileEvent::Planned { to_add: 1, .. }))
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::Reconcile(ReconcileEvent::EntryApplied { volume: 1, page_count: 2, .. })
    )));
    assert!(matches!(
        events.last(),
        Some(CoreEvent::Reconcile(ReconcileEvent::Completed { added: 1, .. }))
    ));
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_creates_series() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "beta", &[(1, 4), (2, 6)]).await;

    let registrar = SeriesRegistrar::new(storage, repo.clone())
        .with_cdn_base("https://cdn.example.com");
    let details = SeriesDetails::new("Beta").with_status(SeriesStatus::Completed);
    let report = registrar
        .register_from_bucket("beta", &details, &ApplyPolicy::AutoApprove)
        .await
        .unwrap();

    assert!(report.created);
    assert_eq!(report.apply_report().unwrap().added(), 2);

    let found = repo.get_series_by_slug("beta").await.unwrap().unwrap();
    assert_eq!(found.series.title, "Beta");
    assert_eq!(found.series.total_volumes, 2);
    assert_eq!(found.series.status, SeriesStatus::Completed);
    assert_eq!(
        found.series.cover_url.as_deref(),
        Some("https://cdn.example.com/series/beta/volume-001/001.webp")
    );
    assert_eq!(page_counts(&repo, "beta").await, vec![(1, 4), (2, 6)]);
}

#[tokio::test]
async fn test_register_appends_and_skips_duplicates() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "beta", &[(1, 4), (2, 6)]).await;
    seed_catalog(&repo, "beta", &[(1, 4)]).await;

    let registrar = SeriesRegistrar::new(storage, repo.clone());
    let policy = ApplyPolicy::Confirm(Arc::new(FixedConfirmation(true)));
    let report = registrar
        .register_from_bucket("beta", &SeriesDetails::new("Beta"), &policy)
        .await
        .unwrap();

    assert!(!report.created);
    let applied = report.apply_report().unwrap();
    assert_eq!(applied.added(), 1);
    assert_eq!(applied.skipped(), 1);
    assert_eq!(applied.failed(), 0);
}

#[tokio::test]
async fn test_register_append_declined() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "beta", &[(2, 6)]).await;
    seed_catalog(&repo, "beta", &[(1, 4)]).await;

    let policy = ApplyPolicy::Confirm(Arc::new(FixedConfirmation(false)));
    let report = SeriesRegistrar::new(storage, repo.clone())
        .register_from_bucket("beta", &SeriesDetails::new("Beta"), &policy)
        .await
        .unwrap();

    assert_eq!(report.outcome, RegistrationOutcome::Declined);
    assert_eq!(page_counts(&repo, "beta").await, vec![(1, 4)]);
}

#[tokio::test]
async fn test_register_new_series_needs_no_confirmation() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "gamma", &[(1, 1)]).await;

    // A declining prompt only guards appends
    let policy = ApplyPolicy::Confirm(Arc::new(FixedConfirmation(false)));
    let report = SeriesRegistrar::new(storage, repo)
        .register_from_bucket("gamma", &SeriesDetails::new("Gamma"), &policy)
        .await
        .unwrap();

    assert!(report.created);
    assert_eq!(report.apply_report().unwrap().added(), 1);
}

#[tokio::test]
async fn test_register_empty_bucket() {
    let (storage, repo) = setup().await;

    let err = SeriesRegistrar::new(storage, repo)
        .register_from_bucket("none", &SeriesDetails::new("None"), &ApplyPolicy::AutoApprove)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NoVolumesInBucket { .. }));
}

#[tokio::test]
async fn test_register_dry_run() {
    let (storage, repo) = setup().await;
    seed_bucket(&storage, "delta", &[(1, 1)]).await;

    let report = SeriesRegistrar::new(storage, repo.clone())
        .register_from_bucket("delta", &SeriesDetails::new("Delta"), &ApplyPolicy::DryRun)
        .await
        .unwrap();

    assert_eq!(report.outcome, RegistrationOutcome::DryRun);
    assert!(report.series_id.is_none());
    assert!(repo.get_series_by_slug("delta").await.unwrap().is_none());
}

// ============================================================================
// Circuit breaker
// ============================================================================

mock! {
    FailingCatalog {}

    #[async_trait]
    impl CatalogRepository for FailingCatalog {
        async fn get_series_by_slug(&self, slug: &str) -> core_catalog::Result<Option<SeriesWithVolumes>>;
        async fn list_series(&self) -> core_catalog::Result<Vec<Series>>;
        async fn list_series_with_volume_counts(&self) -> core_catalog::Result<Vec<SeriesSummary>>;
        async fn create_series(&self, series: &NewSeries) -> core_catalog::Result<String>;
        async fn add_volume(&self, volume: &NewVolume) -> core_catalog::Result<String>;
        async fn update_volume_page_count(&self, update: &VolumeUpdate) -> core_catalog::Result<()>;
    }
}

fn series(slug: &str) -> Series {
    Series {
        id: format!("{}-id", slug),
        slug: slug.to_string(),
        title: slug.to_string(),
        cover_url: None,
        total_volumes: 0,
        status: SeriesStatus::Ongoing,
        created_at: 0,
    }
}

#[tokio::test]
async fn test_circuit_breaker_halts_reconcile() {
    let storage = Arc::new(ObjectStoreStorage::in_memory());
    seed_bucket(&storage, "alpha", &[(1, 1), (2, 1), (3, 1), (4, 1), (5, 1)]).await;

    let mut repo = MockFailingCatalog::new();
    repo.expect_get_series_by_slug().returning(|slug| {
        Ok(Some(SeriesWithVolumes {
            series: series(slug),
            volumes: Vec::new(),
        }))
    });
    repo.expect_add_volume()
        .times(3)
        .returning(|_| Err(CatalogError::Database(sqlx::Error::PoolTimedOut)));

    let report = ReconcileCoordinator::new(storage, Arc::new(repo))
        .reconcile("alpha", &ApplyPolicy::AutoApprove)
        .await
        .unwrap();

    let applied = report.apply_report().unwrap();
    assert_eq!(report.summary.failed, 3);
    assert!(applied.halted);
    let unattempted: Vec<_> = applied.unattempted.iter().map(|c| c.volume_number).collect();
    assert_eq!(unattempted, vec![4, 5]);
}
