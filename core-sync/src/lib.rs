//! # Reconciliation Module
//!
//! Keeps the catalog consistent with what is actually stored in the bucket.
//!
//! ## Overview
//!
//! This module compares the volumes present in object storage with the volume
//! records in the catalog, and applies the difference:
//! - Listing volume folders and counting their files (paginated)
//! - Diffing bucket contents against recorded page counts
//! - Applying additions and page-count updates with a circuit breaker
//! - Registering new series from bucket contents
//!
//! ## Components
//!
//! - **Naming** (`naming`): Volume-number parsing and the storage key layout
//! - **Inventory** (`inventory`): Bucket and catalog inventory readers
//! - **Diff Engine** (`diff`): Pure classification into match/update/add/orphan
//! - **Mutation Applier** (`applier`): Sequential, fail-fast catalog writes
//! - **Reconcile Coordinator** (`reconcile`): Dry-run and confirmed apply
//! - **Series Registrar** (`registration`): Create-or-append a series

pub mod applier;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod naming;
pub mod reconcile;
pub mod registration;

pub use applier::{
    AppliedEntry, ApplyReport, EntryOutcome, MutationApplier, DEFAULT_FAILURE_THRESHOLD,
};
pub use diff::{compute_diff, ChangeAction, ChangeEntry, ChangeSet, VolumeDiff};
pub use error::{Result, SyncError};
pub use inventory::{BucketInventory, BucketVolumeEntry, CatalogInventory, SeriesInventory};
pub use naming::{generate_slug, VolumeNameParser};
pub use reconcile::{
    ApplyPolicy, ReconcileCoordinator, ReconcileOutcome, ReconcilePlan, ReconcileReport,
    ReconcileSummary,
};
pub use registration::{
    RegistrationOutcome, RegistrationReport, SeriesDetails, SeriesRegistrar,
};
