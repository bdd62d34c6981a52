//! # Reconcile Coordinator
//!
//! Brings the catalog in line with the bucket for one series.
//!
//! ## Workflow
//!
//! 1. Read the bucket inventory and the catalog record
//! 2. Diff them into a [`ChangeSet`]
//! 3. Depending on the [`ApplyPolicy`]: stop (dry run), ask for confirmation,
//!    or apply straight away
//! 4. Summarize matched/added/updated/skipped/failed/orphaned counts
//!
//! A dry run never touches the catalog. Orphans are only reported.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = ReconcileCoordinator::new(storage, repository)
//!     .with_event_bus(event_bus);
//!
//! let report = coordinator.reconcile("alpha", &ApplyPolicy::DryRun).await?;
//! for diff in report.change_set.entries() {
//!     println!("{:?}", diff);
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use bridge_traits::prompt::ConfirmationPrompt;
use bridge_traits::storage::ObjectStorage;
use core_catalog::{CatalogRepository, Series};
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::applier::{ApplyReport, MutationApplier};
use crate::diff::{compute_diff, ChangeSet};
use crate::error::{Result, SyncError};
use crate::inventory::{BucketInventory, BucketVolumeEntry, CatalogInventory};

/// How a computed change set is handled
#[derive(Clone)]
pub enum ApplyPolicy {
    /// Report the change set without mutating anything
    DryRun,
    /// Ask before mutating
    Confirm(Arc<dyn ConfirmationPrompt>),
    /// Mutate without asking
    AutoApprove,
}

impl ApplyPolicy {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, ApplyPolicy::DryRun)
    }

    /// Whether a mutation described by `message` may go ahead
    ///
    /// Always false for a dry run.
    pub fn approves(&self, message: &str) -> bool {
        match self {
            ApplyPolicy::DryRun => false,
            ApplyPolicy::Confirm(prompt) => prompt.confirm(message),
            ApplyPolicy::AutoApprove => true,
        }
    }
}

impl fmt::Debug for ApplyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyPolicy::DryRun => f.write_str("DryRun"),
            ApplyPolicy::Confirm(_) => f.write_str("Confirm"),
            ApplyPolicy::AutoApprove => f.write_str("AutoApprove"),
        }
    }
}

/// Inputs and diff for one series, before anything is applied
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    pub series: Series,
    pub bucket: Vec<BucketVolumeEntry>,
    pub change_set: ChangeSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Changes were computed but not applied
    DryRun,
    /// Nothing to add or update
    UpToDate,
    /// The confirmation prompt was declined
    Declined,
    Applied(ApplyReport),
}

/// Final counts of a reconcile run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub matched: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub orphaned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub slug: String,
    pub change_set: ChangeSet,
    pub outcome: ReconcileOutcome,
    pub summary: ReconcileSummary,
}

impl ReconcileReport {
    fn new(slug: &str, change_set: ChangeSet, outcome: ReconcileOutcome) -> Self {
        let mut summary = ReconcileSummary {
            matched: change_set.matched(),
            orphaned: change_set.orphaned(),
            ..Default::default()
        };
        if let ReconcileOutcome::Applied(apply) = &outcome {
            summary.added = apply.added();
            summary.updated = apply.updated();
            summary.skipped = apply.skipped();
            summary.failed = apply.failed();
        }

        Self {
            slug: slug.to_string(),
            change_set,
            outcome,
            summary,
        }
    }

    pub fn apply_report(&self) -> Option<&ApplyReport> {
        match &self.outcome {
            ReconcileOutcome::Applied(report) => Some(report),
            _ => None,
        }
    }
}

/// Reconcile Coordinator
#[derive(Clone)]
pub struct ReconcileCoordinator {
    bucket: BucketInventory,
    catalog: CatalogInventory,
    applier: MutationApplier,
    event_bus: Option<EventBus>,
}

impl ReconcileCoordinator {
    pub fn new(storage: Arc<dyn ObjectStorage>, repository: Arc<dyn CatalogRepository>) -> Self {
        Self {
            bucket: BucketInventory::new(storage),
            catalog: CatalogInventory::new(repository.clone()),
            applier: MutationApplier::new(repository),
            event_bus: None,
        }
    }

    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.applier = self.applier.with_failure_threshold(threshold);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.applier = self.applier.with_event_bus(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    /// Read both inventories and diff them
    ///
    /// # Errors
    ///
    /// - `SyncError::StorageUnavailable` if the bucket cannot be listed
    /// - `SyncError::SeriesNotFound` if the catalog has no such series
    #[instrument(skip(self))]
    pub async fn plan(&self, slug: &str) -> Result<ReconcilePlan> {
        let bucket = self.bucket.list(slug).await?;
        if bucket.is_empty() {
            warn!(slug, "No volumes found in bucket");
        }

        let inventory = self
            .catalog
            .fetch_series(slug)
            .await?
            .ok_or_else(|| SyncError::SeriesNotFound {
                slug: slug.to_string(),
            })?;

        let change_set = compute_diff(&bucket, &inventory.page_counts);

        info!(
            slug,
            matched = change_set.matched(),
            to_add = change_set.to_add(),
            to_update = change_set.to_update(),
            orphaned = change_set.orphaned(),
            "Change set computed"
        );
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Reconcile(ReconcileEvent::Planned {
                slug: slug.to_string(),
                matched: change_set.matched() as u64,
                to_add: change_set.to_add() as u64,
                to_update: change_set.to_update() as u64,
                orphaned: change_set.orphaned() as u64,
            }))
            .ok();
        }

        Ok(ReconcilePlan {
            series: inventory.series,
            bucket,
            change_set,
        })
    }

    /// Plan, then apply according to `policy`
    #[instrument(skip(self, policy), fields(policy = ?policy))]
    pub async fn reconcile(&self, slug: &str, policy: &ApplyPolicy) -> Result<ReconcileReport> {
        let plan = self.plan(slug).await?;
        let changes = plan.change_set.changes();

        let outcome = if !plan.change_set.has_changes() {
            info!(slug, "Catalog already matches bucket");
            ReconcileOutcome::UpToDate
        } else if policy.is_dry_run() {
            ReconcileOutcome::DryRun
        } else if !policy.approves(&format!(
            "Apply {} change(s) to '{}'?",
            changes.len(),
            slug
        )) {
            info!(slug, "Changes declined");
            ReconcileOutcome::Declined
        } else {
            let report = self.applier.apply(slug, &plan.series.id, &changes).await;
            ReconcileOutcome::Applied(report)
        };

        Ok(ReconcileReport::new(slug, plan.change_set, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::prompt::FixedConfirmation;

    #[test]
    fn test_policy_approval() {
        assert!(!ApplyPolicy::DryRun.approves("go?"));
        assert!(ApplyPolicy::AutoApprove.approves("go?"));
        assert!(ApplyPolicy::Confirm(Arc::new(FixedConfirmation(true))).approves("go?"));
        assert!(!ApplyPolicy::Confirm(Arc::new(FixedConfirmation(false))).approves("go?"));
    }

    #[test]
    fn test_policy_debug_hides_prompt() {
        let policy = ApplyPolicy::Confirm(Arc::new(FixedConfirmation(true)));
        assert_eq!(format!("{:?}", policy), "Confirm");
    }

    #[test]
    fn test_summary_from_dry_run() {
        let change_set = compute_diff(
            &[BucketVolumeEntry::new(1, 2), BucketVolumeEntry::new(2, 3)],
            &[(1, 2), (4, 4)].into_iter().collect(),
        );
        let report = ReconcileReport::new("alpha", change_set, ReconcileOutcome::DryRun);

        assert_eq!(
            report.summary,
            ReconcileSummary {
                matched: 1,
                orphaned: 1,
                ..Default::default()
            }
        );
        assert!(report.apply_report().is_none());
    }
}
