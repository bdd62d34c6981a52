//! # Mutation Applier
//!
//! Applies a change set to the catalog one entry at a time, in ascending
//! volume order.
//!
//! ## Outcomes
//!
//! - `ADD` creates a volume record; a duplicate signal means the volume is
//!   already recorded and the entry is **skipped**.
//! - `UPDATE` sets the page count; an "unsupported" signal from the backend
//!   marks the entry **skipped**.
//! - Any other error marks the entry **failed**.
//!
//! A single failure counter covers the whole run. When it reaches the
//! threshold the applier stops and lists every remaining entry as
//! unattempted. Mutation errors are reported, never returned.

use std::sync::Arc;

use core_catalog::{CatalogError, CatalogRepository, NewVolume, VolumeUpdate};
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::diff::{ChangeAction, ChangeEntry};

/// Failures tolerated before the applier halts
pub const DEFAULT_FAILURE_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    Added,
    Updated,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEntry {
    pub entry: ChangeEntry,
    pub outcome: EntryOutcome,
}

/// Result of one apply run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Attempted entries, in the order they were processed
    pub outcomes: Vec<AppliedEntry>,
    /// Whether the failure threshold stopped the run
    pub halted: bool,
    /// Entries never attempted because the run halted
    pub unattempted: Vec<ChangeEntry>,
}

impl ApplyReport {
    pub fn added(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Added))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Updated))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed { .. }))
    }

    /// True when every attempted entry succeeded or was skipped and nothing
    /// was left unattempted
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && !self.halted
    }

    fn count(&self, predicate: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|e| predicate(&e.outcome)).count()
    }
}

/// Sequential, fail-fast catalog writer
#[derive(Clone)]
pub struct MutationApplier {
    repository: Arc<dyn CatalogRepository>,
    failure_threshold: usize,
    event_bus: Option<EventBus>,
}

impl MutationApplier {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self {
            repository,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            event_bus: None,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Apply `changes` to the series identified by `series_id`
    ///
    /// `slug` is used for logging and events only.
    pub async fn apply(&self, slug: &str, series_id: &str, changes: &[ChangeEntry]) -> ApplyReport {
        let mut ordered = changes.to_vec();
        ordered.sort_by_key(|c| c.volume_number);

        let mut report = ApplyReport::default();
        let mut failures = 0usize;

        for (index, entry) in ordered.iter().enumerate() {
            if failures >= self.failure_threshold {
                report.halted = true;
                report.unattempted = ordered[index..].to_vec();
                break;
            }

            let outcome = self.apply_entry(series_id, entry).await;
            self.emit_outcome(slug, entry, &outcome);

            if matches!(outcome, EntryOutcome::Failed { .. }) {
                failures += 1;
            }
            report.outcomes.push(AppliedEntry {
                entry: *entry,
                outcome,
            });
        }

        if report.halted {
            error!(
                slug,
                failures,
                unattempted = report.unattempted.len(),
                "Too many failures, stopping"
            );
            self.emit(ReconcileEvent::CircuitOpened {
                slug: slug.to_string(),
                failures: failures as u64,
                unattempted: report.unattempted.len() as u64,
            });
        }

        info!(
            slug,
            added = report.added(),
            updated = report.updated(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Apply finished"
        );
        self.emit(ReconcileEvent::Completed {
            slug: slug.to_string(),
            added: report.added() as u64,
            updated: report.updated() as u64,
            skipped: report.skipped() as u64,
            failed: report.failed() as u64,
        });

        report
    }

    async fn apply_entry(&self, series_id: &str, entry: &ChangeEntry) -> EntryOutcome {
        match entry.action {
            ChangeAction::Add => {
                let volume = NewVolume::new(series_id, entry.volume_number, entry.page_count);
                match self.repository.add_volume(&volume).await {
                    Ok(_) => EntryOutcome::Added,
                    Err(e) if e.is_duplicate() => EntryOutcome::Skipped {
                        reason: "volume already recorded".to_string(),
                    },
                    Err(e) => Self::failed(entry, e),
                }
            }
            ChangeAction::Update => {
                let update = VolumeUpdate::new(series_id, entry.volume_number, entry.page_count);
                match self.repository.update_volume_page_count(&update).await {
                    Ok(()) => EntryOutcome::Updated,
                    Err(e) if e.is_unsupported() => EntryOutcome::Skipped {
                        reason: "update not supported by catalog".to_string(),
                    },
                    Err(e) => Self::failed(entry, e),
                }
            }
        }
    }

    fn failed(entry: &ChangeEntry, err: CatalogError) -> EntryOutcome {
        warn!(
            volume = entry.volume_number,
            action = %entry.action,
            error = %err,
            "Change failed"
        );
        EntryOutcome::Failed {
            error: err.to_string(),
        }
    }

    fn emit_outcome(&self, slug: &str, entry: &ChangeEntry, outcome: &EntryOutcome) {
        let event = match outcome {
            EntryOutcome::Added | EntryOutcome::Updated => {
                debug!(
                    slug,
                    volume = entry.volume_number,
                    action = %entry.action,
                    pages = entry.page_count,
                    "Change applied"
                );
                ReconcileEvent::EntryApplied {
                    slug: slug.to_string(),
                    volume: entry.volume_number,
                    action: entry.action.to_string(),
                    page_count: entry.page_count,
                }
            }
            EntryOutcome::Skipped { reason } => {
                debug!(slug, volume = entry.volume_number, reason = %reason, "Change skipped");
                ReconcileEvent::EntrySkipped {
                    slug: slug.to_string(),
                    volume: entry.volume_number,
                    reason: reason.clone(),
                }
            }
            EntryOutcome::Failed { error } => ReconcileEvent::EntryFailed {
                slug: slug.to_string(),
                volume: entry.volume_number,
                message: error.clone(),
            },
        };
        self.emit(event);
    }

    fn emit(&self, event: ReconcileEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Reconcile(event)).ok();
        }
    }
}
