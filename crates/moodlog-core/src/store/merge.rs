//! Reconciliation of the live partition with backfilled pages.
//!
//! The feed is the id-based union of both partitions, re-sorted by
//! `created_at` descending. Ids are only used for dedup, never for order.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{EntryId, JournalEntry};

/// How much of the collection the last live snapshot speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveCoverage {
    /// No snapshot received yet
    #[default]
    Unknown,
    /// The snapshot was shorter than the live window, so it is the whole collection
    Everything,
    /// The snapshot filled the window; it is complete for entries newer than this
    NewerThan(DateTime<Utc>),
}

impl LiveCoverage {
    /// Coverage of a snapshot that is already sorted newest first.
    pub fn of(snapshot: &[JournalEntry], live_window: usize) -> Self {
        if snapshot.len() < live_window {
            return Self::Everything;
        }
        match snapshot.last() {
            Some(oldest) => Self::NewerThan(oldest.created_at),
            None => Self::Everything,
        }
    }

    pub fn covers(&self, entry: &JournalEntry) -> bool {
        match self {
            Self::Unknown => false,
            Self::Everything => true,
            Self::NewerThan(floor) => entry.created_at > *floor,
        }
    }
}

/// Stable sort, newest first. Equal timestamps keep their relative order.
pub fn sort_desc(entries: &mut [JournalEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Drop later copies of an id, keeping the first.
pub fn dedup_by_id(entries: &mut Vec<JournalEntry>) {
    let mut seen: HashSet<EntryId> = HashSet::with_capacity(entries.len());
    entries.retain(|e| seen.insert(e.id.clone()));
}

/// Append the entries of `page` whose ids `target` does not hold yet.
/// Returns how many were appended.
pub fn append_unseen(target: &mut Vec<JournalEntry>, page: Vec<JournalEntry>) -> usize {
    let mut seen: HashSet<EntryId> = target.iter().map(|e| e.id.clone()).collect();
    let before = target.len();
    for entry in page {
        if seen.insert(entry.id.clone()) {
            target.push(entry);
        }
    }
    target.len() - before
}

/// Remove backfilled entries the live snapshot is authoritative for but no
/// longer contains: they were deleted remotely. Returns how many were dropped.
pub fn prune_missing_from_live(
    backfill: &mut Vec<JournalEntry>,
    live: &[JournalEntry],
    coverage: LiveCoverage,
) -> usize {
    if coverage == LiveCoverage::Unknown {
        return 0;
    }
    let live_ids: HashSet<&EntryId> = live.iter().map(|e| &e.id).collect();
    let before = backfill.len();
    backfill.retain(|e| live_ids.contains(&e.id) || !coverage.covers(e));
    before - backfill.len()
}

/// Union of both partitions. Live copies win over backfilled copies of the
/// same id.
pub fn merge_partitions(live: &[JournalEntry], backfill: &[JournalEntry]) -> Vec<JournalEntry> {
    let mut merged = Vec::with_capacity(live.len() + backfill.len());
    merged.extend(live.iter().cloned());
    merged.extend(backfill.iter().cloned());
    dedup_by_id(&mut merged);
    sort_desc(&mut merged);
    merged
}
