//! # Diff Engine
//!
//! Pure comparison of a bucket inventory against catalog page counts.
//!
//! Every volume number in the union of both inputs is classified exactly once:
//!
//! | bucket | catalog | result |
//! |---|---|---|
//! | n pages | n pages | `Match` |
//! | n pages | m pages | `Update` to n |
//! | n pages | - | `Add` with n |
//! | - | m pages | `Orphan` (reported, never mutated) |
//!
//! Output is ascending by volume number whatever the input order, so the same
//! inputs always produce the same [`ChangeSet`].

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::inventory::BucketVolumeEntry;

/// Classification of one volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeDiff {
    Match { volume: u32, page_count: u32 },
    Update { volume: u32, from: u32, to: u32 },
    Add { volume: u32, page_count: u32 },
    Orphan { volume: u32, page_count: u32 },
}

impl VolumeDiff {
    pub fn volume(&self) -> u32 {
        match self {
            VolumeDiff::Match { volume, .. }
            | VolumeDiff::Update { volume, .. }
            | VolumeDiff::Add { volume, .. }
            | VolumeDiff::Orphan { volume, .. } => *volume,
        }
    }

    /// The catalog mutation this classification calls for, if any
    pub fn change(&self) -> Option<ChangeEntry> {
        match *self {
            VolumeDiff::Update { volume, to, .. } => Some(ChangeEntry::update(volume, to)),
            VolumeDiff::Add { volume, page_count } => Some(ChangeEntry::add(volume, page_count)),
            VolumeDiff::Match { .. } | VolumeDiff::Orphan { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Add,
    Update,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Add => "ADD",
            ChangeAction::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog mutation to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub volume_number: u32,
    pub action: ChangeAction,
    pub page_count: u32,
}

impl ChangeEntry {
    pub fn add(volume_number: u32, page_count: u32) -> Self {
        Self {
            volume_number,
            action: ChangeAction::Add,
            page_count,
        }
    }

    pub fn update(volume_number: u32, page_count: u32) -> Self {
        Self {
            volume_number,
            action: ChangeAction::Update,
            page_count,
        }
    }
}

/// Classified result of a diff, ascending by volume number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    entries: Vec<VolumeDiff>,
}

impl ChangeSet {
    pub fn entries(&self) -> &[VolumeDiff] {
        &self.entries
    }

    /// Mutations only (`Add` and `Update`), ascending
    pub fn changes(&self) -> Vec<ChangeEntry> {
        self.entries.iter().filter_map(VolumeDiff::change).collect()
    }

    pub fn orphans(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|d| matches!(d, VolumeDiff::Orphan { .. }))
            .map(VolumeDiff::volume)
            .collect()
    }

    pub fn matched(&self) -> usize {
        self.count(|d| matches!(d, VolumeDiff::Match { .. }))
    }

    pub fn to_add(&self) -> usize {
        self.count(|d| matches!(d, VolumeDiff::Add { .. }))
    }

    pub fn to_update(&self) -> usize {
        self.count(|d| matches!(d, VolumeDiff::Update { .. }))
    }

    pub fn orphaned(&self) -> usize {
        self.count(|d| matches!(d, VolumeDiff::Orphan { .. }))
    }

    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|d| d.change().is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn count(&self, predicate: impl Fn(&VolumeDiff) -> bool) -> usize {
        self.entries.iter().filter(|d| predicate(d)).count()
    }
}

/// Compare bucket contents with catalog page counts
///
/// When `bucket` lists a volume more than once, the first occurrence is used.
pub fn compute_diff(bucket: &[BucketVolumeEntry], catalog: &BTreeMap<u32, u32>) -> ChangeSet {
    let mut stored: BTreeMap<u32, u32> = BTreeMap::new();
    for entry in bucket {
        stored
            .entry(entry.volume_number)
            .or_insert(entry.file_count);
    }

    let mut entries = Vec::with_capacity(stored.len() + catalog.len());

    for (&volume, &files) in &stored {
        let diff = match catalog.get(&volume) {
            Some(&pages) if pages == files => VolumeDiff::Match {
                volume,
                page_count: files,
            },
            Some(&pages) => VolumeDiff::Update {
                volume,
                from: pages,
                to: files,
            },
            None => VolumeDiff::Add {
                volume,
                page_count: files,
            },
        };
        entries.push(diff);
    }

    for (&volume, &pages) in catalog {
        if !stored.contains_key(&volume) {
            entries.push(VolumeDiff::Orphan {
                volume,
                page_count: pages,
            });
        }
    }

    entries.sort_by_key(VolumeDiff::volume);
    ChangeSet { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn bucket(entries: &[(u32, u32)]) -> Vec<BucketVolumeEntry> {
        entries
            .iter()
            .map(|&(v, n)| BucketVolumeEntry::new(v, n))
            .collect()
    }

    fn catalog(entries: &[(u32, u32)]) -> BTreeMap<u32, u32> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_match_update_add() {
        let diff = compute_diff(
            &bucket(&[(1, 20), (2, 18), (3, 25)]),
            &catalog(&[(1, 20), (2, 15)]),
        );

        assert_eq!(
            diff.entries(),
            &[
                VolumeDiff::Match { volume: 1, page_count: 20 },
                VolumeDiff::Update { volume: 2, from: 15, to: 18 },
                VolumeDiff::Add { volume: 3, page_count: 25 },
            ]
        );
        assert_eq!(
            diff.changes(),
            vec![ChangeEntry::update(2, 18), ChangeEntry::add(3, 25)]
        );
        assert!(diff.orphans().is_empty());
    }

    #[test]
    fn test_orphan_reported_not_mutated() {
        let diff = compute_diff(&bucket(&[(1, 20)]), &catalog(&[(1, 20), (5, 30)]));

        assert_eq!(diff.matched(), 1);
        assert_eq!(diff.orphans(), vec![5]);
        assert!(diff.changes().is_empty());
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_output_sorted_regardless_of_input_order() {
        let shuffled = bucket(&[(9, 1), (2, 2), (5, 5), (1, 1)]);
        let diff = compute_diff(&shuffled, &catalog(&[(7, 3), (5, 4)]));

        let volumes: Vec<_> = diff.entries().iter().map(VolumeDiff::volume).collect();
        assert_eq!(volumes, vec![1, 2, 5, 7, 9]);
    }

    #[test]
    fn test_idempotent() {
        let b = bucket(&[(3, 10), (1, 4), (2, 7)]);
        let c = catalog(&[(2, 6), (4, 1)]);
        assert_eq!(compute_diff(&b, &c), compute_diff(&b, &c));
    }

    #[test]
    fn test_each_volume_classified_once() {
        let b = bucket(&[(1, 1), (2, 2), (3, 3), (6, 1)]);
        let c = catalog(&[(2, 2), (3, 4), (4, 4), (5, 5)]);
        let diff = compute_diff(&b, &c);

        let volumes: Vec<_> = diff.entries().iter().map(VolumeDiff::volume).collect();
        let unique: BTreeSet<_> = volumes.iter().copied().collect();
        assert_eq!(unique.len(), volumes.len());
        assert_eq!(volumes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            diff.matched() + diff.to_add() + diff.to_update() + diff.orphaned(),
            6
        );
    }

    #[test]
    fn test_duplicate_bucket_volume_first_wins() {
        let diff = compute_diff(&bucket(&[(1, 10), (1, 99)]), &catalog(&[]));
        assert_eq!(diff.changes(), vec![ChangeEntry::add(1, 10)]);
    }

    #[test]
    fn test_empty_inputs() {
        let diff = compute_diff(&[], &BTreeMap::new());
        assert!(diff.is_empty());
        assert!(!diff.has_changes());
    }
}
