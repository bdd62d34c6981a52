//! Integration tests for the service façade
//!
//! Publish runs against real files in temporary directories, an in-memory
//! object store and an in-memory SQLite catalog.

use bridge_desktop::ObjectStoreStorage;
use bridge_traits::prompt::{FixedConfirmation, OptionSelector, Selection};
use bridge_traits::storage::ObjectStorage;
use bytes::Bytes;
use core_catalog::{db::create_test_pool, CatalogRepository, SqliteCatalogRepository};
use core_runtime::events::{CoreEvent, PipelineEvent, PipelineStage};
use core_runtime::PipelineSettings;
use core_service::{
    ArchiveService, CoreDependencies, PublishRequest, SeriesSelection, ServiceError,
    SlugSelection,
};
use core_sync::inventory::{BucketInventory, BucketVolumeEntry};
use core_sync::naming::{object_key, page_file_name};
use core_sync::{ApplyPolicy, ReconcileOutcome, RegistrationOutcome, SeriesDetails};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use mockall::mock;
use mockall::predicate::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const CDN: &str = "https://cdn.example.com";

mock! {
    Selector {}
    impl OptionSelector for Selector {
        fn select(&self, title: &str, options: &[String], default_index: usize) -> Selection;
    }
}

struct Harness {
    service: ArchiveService,
    storage: Arc<ObjectStoreStorage>,
    repo: Arc<SqliteCatalogRepository>,
    source: TempDir,
    _output: TempDir,
}

async fn harness() -> Harness {
    let storage = Arc::new(ObjectStoreStorage::in_memory());
    let repo = Arc::new(SqliteCatalogRepository::new(create_test_pool().await.unwrap()));
    let source = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let settings = PipelineSettings {
        workers: 2,
        output_root: output.path().to_path_buf(),
        ..Default::default()
    };
    let service = ArchiveService::new(
        CoreDependencies::new(storage.clone(), repo.clone()),
        settings,
    )
    .with_cdn_base(CDN);

    Harness {
        service,
        storage,
        repo,
        source,
        _output: output,
    }
}

fn write_images(dir: &Path, count: u8) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 14, Rgb([i * 20, 90, 200])));
        img.save_with_format(dir.join(format!("scan_{:02}.png", i)), ImageFormat::Png)
            .unwrap();
    }
}

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

async fn catalog_counts(repo: &SqliteCatalogRepository, slug: &str) -> Vec<(u32, u32)> {
    repo.get_series_by_slug(slug)
        .await
        .unwrap()
        .map(|s| s.page_counts().into_iter().collect())
        .unwrap_or_default()
}

// ============================================================================
// Publish
// ============================================================================

#[tokio::test]
async fn test_publish_converts_uploads_and_registers() {
    let h = harness().await;
    write_images(&h.source.path().join("Vol 1"), 2);
    write_images(&h.source.path().join("Volume 2"), 3);
    fs::create_dir_all(h.source.path().join("extras")).unwrap();

    let mut events = h.service.subscribe();
    let report = h
        .service
        .publish_series(PublishRequest::new(
            "alpha",
            h.source.path(),
            SeriesDetails::new("Alpha"),
        ))
        .await
        .unwrap();

    assert!(report.converted);
    assert!(report.uploaded);
    assert_eq!(report.output_dir, h.service.settings().output_dir("alpha"));
    assert_eq!(
        report.page_counts().into_iter().collect::<Vec<_>>(),
        vec![(1, 2), (2, 3)]
    );

    let listed = BucketInventory::new(h.storage.clone())
        .list("alpha")
        .await
        .unwrap();
    assert_eq!(
        listed,
        vec![BucketVolumeEntry::new(1, 2), BucketVolumeEntry::new(2, 3)]
    );

    let registration = report.registration.expect("catalog step ran");
    assert!(registration.created);
    assert_eq!(registration.apply_report().unwrap().added(), 2);

    let series = h.repo.get_series_by_slug("alpha").await.unwrap().unwrap();
    assert_eq!(series.series.title, "Alpha");
    assert_eq!(series.series.total_volumes, 2);
    assert_eq!(
        series.series.cover_url.as_deref(),
        Some("https://cdn.example.com/series/alpha/volume-001/001.webp")
    );
    assert_eq!(catalog_counts(&h.repo, "alpha").await, vec![(1, 2), (2, 3)]);

    let mut uploaded_volumes = Vec::new();
    while let Some(Ok(event)) = events.try_recv() {
        if let CoreEvent::Pipeline(PipelineEvent::VolumeCompleted {
            stage: PipelineStage::Upload,
            volume,
            ..
        }) = event
        {
            uploaded_volumes.push(volume);
        }
    }
    uploaded_volumes.sort();
    assert_eq!(uploaded_volumes, vec![1, 2]);
}

#[tokio::test]
async fn test_publish_aborts_on_conversion_failure() {
    let h = harness().await;
    write_images(&h.source.path().join("Vol 1"), 2);
    let broken = h.source.path().join("Vol 2");
    write_images(&broken, 1);
    fs::write(broken.join("scan_99.png"), b"not an image").unwrap();

    let err = h
        .service
        .publish_series(PublishRequest::new(
            "alpha",
            h.source.path(),
            SeriesDetails::new("Alpha"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::ConversionFailed { ref volumes } if volumes == &[2]));
    assert!(BucketInventory::new(h.storage.clone())
        .list_series_slugs()
        .await
        .unwrap()
        .is_empty());
    assert!(h.repo.get_series_by_slug("alpha").await.unwrap().is_none());
}

#[tokio::test]
async fn test_publish_single_volume() {
    let h = harness().await;
    write_images(&h.source.path().join("Vol 1"), 2);
    write_images(&h.source.path().join("Vol 4"), 1);

    let report = h
        .service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .only_volume(4),
        )
        .await
        .unwrap();

    assert_eq!(report.volumes.len(), 1);
    assert_eq!(report.volumes[0].volume_number, 4);
    assert_eq!(catalog_counts(&h.repo, "alpha").await, vec![(4, 1)]);
}

#[tokio::test]
async fn test_publish_missing_volume_or_sources() {
    let h = harness().await;

    let err = h
        .service
        .publish_series(PublishRequest::new(
            "alpha",
            h.source.path(),
            SeriesDetails::new("Alpha"),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NoLocalVolumes { .. }));

    write_images(&h.source.path().join("Vol 1"), 1);
    let err = h
        .service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .only_volume(7),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::VolumeNotFound { volume: 7, .. }));
}

#[tokio::test]
async fn test_skip_conversion_needs_existing_output() {
    let h = harness().await;
    write_images(&h.source.path().join("Vol 1"), 2);

    let err = h
        .service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .skip_conversion(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ConversionFailed { ref volumes } if volumes == &[1]));

    // Convert once without publishing, then reuse the output
    h.service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .without_upload()
                .without_catalog(),
        )
        .await
        .unwrap();

    let report = h
        .service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .skip_conversion(),
        )
        .await
        .unwrap();
    assert!(!report.converted);
    assert!(report.uploaded);
    assert_eq!(catalog_counts(&h.repo, "alpha").await, vec![(1, 2)]);
}

#[tokio::test]
async fn test_declined_upload_leaves_catalog_untouched() {
    let h = harness().await;
    write_images(&h.source.path().join("Vol 1"), 3);

    let report = h
        .service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .with_policy(ApplyPolicy::Confirm(Arc::new(FixedConfirmation(false)))),
        )
        .await
        .unwrap();

    assert!(!report.uploaded);
    assert!(report.upload_declined);
    assert!(report.registration.is_none());
    assert!(BucketInventory::new(h.storage.clone())
        .list("alpha")
        .await
        .unwrap()
        .is_empty());
    assert!(h.repo.get_series_by_slug("alpha").await.unwrap().is_none());
    assert!(h.service.list_series().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_without_upload_registers() {
    let h = harness().await;
    write_images(&h.source.path().join("Vol 1"), 2);

    let report = h
        .service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .without_upload(),
        )
        .await
        .unwrap();

    assert!(!report.uploaded);
    assert!(!report.upload_declined);
    assert!(report.registration.unwrap().created);
    assert_eq!(catalog_counts(&h.repo, "alpha").await, vec![(1, 2)]);
}

#[tokio::test]
async fn test_publish_without_catalog() {
    let h = harness().await;
    write_images(&h.source.path().join("Vol 1"), 1);

    let report = h
        .service
        .publish_series(
            PublishRequest::new("alpha", h.source.path(), SeriesDetails::new("Alpha"))
                .without_catalog(),
        )
        .await
        .unwrap();

    assert!(report.uploaded);
    assert!(report.registration.is_none());
    assert!(h.service.list_series().await.unwrap().is_empty());
}

// ============================================================================
// Reconcile and registration
// ============================================================================

#[tokio::test]
async fn test_register_then_reconcile_through_service() {
    let h = harness().await;
    seed_bucket(&h.storage, "beta", &[(1, 10), (2, 12)]).await;

    let registration = h
        .service
        .register_series("beta", &SeriesDetails::new("Beta"), &ApplyPolicy::AutoApprove)
        .await
        .unwrap();
    assert!(matches!(registration.outcome, RegistrationOutcome::Applied(_)));

    seed_bucket(&h.storage, "beta", &[(2, 14), (3, 9)]).await;
    let report = h
        .service
        .reconcile("beta", &ApplyPolicy::AutoApprove)
        .await
        .unwrap();

    assert!(matches!(report.outcome, ReconcileOutcome::Applied(_)));
    assert_eq!(report.summary.matched, 1);
    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.added, 1);
    assert_eq!(
        catalog_counts(&h.repo, "beta").await,
        vec![(1, 10), (2, 14), (3, 9)]
    );

    let summaries = h.service.list_series_with_volume_counts().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].series.slug, "beta");
    assert_eq!(summaries[0].volume_count, 3);
}

#[tokio::test]
async fn test_reconcile_unknown_series() {
    let h = harness().await;
    seed_bucket(&h.storage, "ghost", &[(1, 3)]).await;

    let err = h
        .service
        .reconcile("ghost", &ApplyPolicy::DryRun)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Sync(_)));
}

// ============================================================================
// Slug selection
// ============================================================================

#[tokio::test]
async fn test_select_existing_default_slug() {
    let h = harness().await;
    seed_bucket(&h.storage, "alpha", &[(1, 1)]).await;
    seed_bucket(&h.storage, "beta", &[(1, 1)]).await;

    let mut selector = MockSelector::new();
    selector
        .expect_select()
        .withf(|title, options, default_index| {
            title == "Select series folder"
                && options.to_vec() == vec!["alpha [default]".to_string(), "beta".to_string()]
                && *default_index == 0
        })
        .times(1)
        .return_const(Selection::Chosen(1));

    let selection = h.service.select_series_slug(&selector, "alpha").await.unwrap();
    assert_eq!(selection, SlugSelection::Selected("beta".to_string()));
}

#[tokio::test]
async fn test_select_offers_new_slug_first() {
    let h = harness().await;
    seed_bucket(&h.storage, "alpha", &[(1, 1)]).await;

    let mut selector = MockSelector::new();
    selector
        .expect_select()
        .withf(|_, options, _| {
            options.to_vec() == vec!["[Create new: gamma]".to_string(), "alpha".to_string()]
        })
        .times(1)
        .return_const(Selection::Chosen(0));

    let selection = h.service.select_series_slug(&selector, "gamma").await.unwrap();
    assert_eq!(selection, SlugSelection::Selected("gamma".to_string()));
}

#[tokio::test]
async fn test_select_cancelled() {
    let h = harness().await;

    let mut selector = MockSelector::new();
    selector
        .expect_select()
        .with(always(), always(), eq(0))
        .return_const(Selection::Cancelled);

    let selection = h.service.select_series_slug(&selector, "alpha").await.unwrap();
    assert_eq!(selection, SlugSelection::Cancelled);
}

#[tokio::test]
async fn test_select_existing_series_lists_volume_counts() {
    let h = harness().await;
    seed_bucket(&h.storage, "alpha", &[(1, 4)]).await;
    seed_bucket(&h.storage, "beta", &[(1, 2), (2, 2)]).await;
    for (slug, title) in [("alpha", "Alpha"), ("beta", "Beta")] {
        h.service
            .register_series(slug, &SeriesDetails::new(title), &ApplyPolicy::AutoApprove)
            .await
            .unwrap();
    }

    let mut selector = MockSelector::new();
    selector
        .expect_select()
        .withf(|title, options, default_index| {
            title == "Select series to append to"
                && options.to_vec()
                    == vec![
                        "Alpha (slug: alpha, 1 volume)".to_string(),
                        "Beta (slug: beta, 2 volumes)".to_string(),
                    ]
                && *default_index == 0
        })
        .times(1)
        .return_const(Selection::Chosen(1));

    let selection = h.service.select_existing_series(&selector).await.unwrap();
    let SeriesSelection::Selected(summary) = selection else {
        panic!("expected a selection, got {:?}", selection);
    };
    assert_eq!(summary.series.slug, "beta");
    assert_eq!(summary.volume_count, 2);
}

#[tokio::test]
async fn test_select_existing_series_empty_or_cancelled() {
    let h = harness().await;

    let mut selector = MockSelector::new();
    selector.expect_select().never();
    assert_eq!(
        h.service.select_existing_series(&selector).await.unwrap(),
        SeriesSelection::Empty
    );

    seed_bucket(&h.storage, "alpha", &[(1, 1)]).await;
    h.service
        .register_series("alpha", &SeriesDetails::new("Alpha"), &ApplyPolicy::AutoApprove)
        .await
        .unwrap();

    let mut selector = MockSelector::new();
    selector
        .expect_select()
        .return_const(Selection::Cancelled);
    assert_eq!(
        h.service.select_existing_series(&selector).await.unwrap(),
        SeriesSelection::Cancelled
    );
}
