use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::merge::{
    append_unseen, dedup_by_id, merge_partitions, prune_missing_from_live, sort_desc,
    LiveCoverage,
};
use crate::backend::{Cursor, EntryCollection, Page, SnapshotCallback, Subscription};
use crate::error::{BackendError, FeedError};
use crate::models::{EntryChanges, EntryId, JournalEntry, OwnerId};

/// What the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub owner: Option<OwnerId>,
    pub entries: Vec<JournalEntry>,
    pub loading: bool,
    pub loading_more: bool,
    pub refreshing: bool,
    pub has_more: bool,
    pub error: Option<FeedError>,
}

#[derive(Default)]
struct FeedState {
    owner: Option<OwnerId>,
    /// Bumped on every open and close; results tagged with an older value are dropped
    generation: u64,
    /// Bumped on refresh so pages fetched against the old cursor are dropped
    epoch: u64,
    subscription: Option<Box<dyn Subscription>>,
    live: Vec<JournalEntry>,
    coverage: LiveCoverage,
    backfill: Vec<JournalEntry>,
    entries: Vec<JournalEntry>,
    cursor: Option<Cursor>,
    has_more: bool,
    loading: bool,
    loading_more: bool,
    refreshing: bool,
    error: Option<FeedError>,
}

impl FeedState {
    fn rebuild(&mut self) {
        self.entries = merge_partitions(&self.live, &self.backfill);
    }

    fn to_snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            owner: self.owner.clone(),
            entries: self.entries.clone(),
            loading: self.loading,
            loading_more: self.loading_more,
            refreshing: self.refreshing,
            has_more: self.has_more,
            error: self.error.clone(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.owner.is_some() && self.generation == generation
    }

    /// Take a fetched page into the backfill partition. `replace` starts over
    /// from this page (refresh); otherwise unseen entries are appended.
    fn accept_page(&mut self, page: Page, page_size: usize, replace: bool) -> usize {
        let short = page.entries.len() < page_size;
        let mut incoming = page.entries;
        dedup_by_id(&mut incoming);
        sort_desc(&mut incoming);
        prune_missing_from_live(&mut incoming, &self.live, self.coverage);

        let added = if replace {
            self.backfill = incoming;
            self.backfill.len()
        } else {
            append_unseen(&mut self.backfill, incoming)
        };

        self.cursor = if short { None } else { page.next_cursor };
        self.has_more = self.cursor.is_some();
        // A dropped live channel stays reported until it is re-established
        if matches!(self.error, Some(FeedError::PageFetchFailure { .. })) {
            self.error = None;
        }
        self.rebuild();
        added
    }
}

struct Shared {
    state: Mutex<FeedState>,
    tx: watch::Sender<FeedSnapshot>,
    live_window: usize,
}

impl Shared {
    fn publish(&self, state: &FeedState) {
        self.tx.send_replace(state.to_snapshot());
    }

    fn apply_live(&self, generation: u64, result: Result<Vec<JournalEntry>, BackendError>) {
        let dead = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                debug!(generation, "discarding live result from a closed subscription");
                return;
            }
            self.apply_live_locked(&mut state, result)
        };

        if let Some(handle) = dead {
            handle.unsubscribe();
        }
    }

    /// Returns the handle of a channel that just dropped so it can be released
    /// outside the lock.
    fn apply_live_locked(
        &self,
        state: &mut FeedState,
        result: Result<Vec<JournalEntry>, BackendError>,
    ) -> Option<Box<dyn Subscription>> {
        let mut dead = None;

        match result {
            Ok(mut snapshot) => {
                dedup_by_id(&mut snapshot);
                sort_desc(&mut snapshot);
                let coverage = LiveCoverage::of(&snapshot, self.live_window);
                let pruned = prune_missing_from_live(&mut state.backfill, &snapshot, coverage);

                debug!(
                    owner = ?state.owner,
                    live = snapshot.len(),
                    pruned,
                    "live snapshot applied"
                );
                state.live = snapshot;
                state.coverage = coverage;
                state.loading = false;
                if matches!(state.error, Some(FeedError::SubscriptionFailure { .. })) {
                    state.error = None;
                }
                state.rebuild();
            }
            Err(e) => {
                warn!(owner = ?state.owner, error = %e, "live subscription failed");
                state.loading = false;
                state.error = Some(FeedError::SubscriptionFailure {
                    message: e.to_string(),
                });
                dead = state.subscription.take();
            }
        }
        self.publish(state);
        dead
    }
}

/// Deduplicated, newest-first feed of one owner's entries.
///
/// Fed by a bounded live subscription and by explicit backfill pages. Every
/// mutation republishes a `FeedSnapshot` on a watch channel. Failures never
/// escape: they are stored in the snapshot's `error` with the loading flags
/// cleared and the held sequence left as it was.
pub struct FeedStore {
    collection: Arc<dyn EntryCollection>,
    page_size: usize,
    shared: Arc<Shared>,
}

impl FeedStore {
    pub fn new(collection: Arc<dyn EntryCollection>, page_size: usize, live_window: usize) -> Self {
        let (tx, _rx) = watch::channel(FeedSnapshot::default());
        Self {
            collection,
            page_size: page_size.max(1),
            shared: Arc::new(Shared {
                state: Mutex::new(FeedState::default()),
                tx,
                live_window: live_window.max(1),
            }),
        }
    }

    /// Start following `owner`'s entries.
    ///
    /// Idempotent per owner. Opening a different owner closes the previous
    /// subscription first. Reopening the same owner after its live channel
    /// failed or dropped subscribes again, keeping the held sequence.
    pub async fn open(&self, owner: OwnerId) {
        let (generation, previous) = {
            let mut state = self.shared.state.lock();
            let generation = state.generation + 1;
            let previous = if state.owner.as_ref() == Some(&owner) {
                // A live handle, or a subscribe still in flight, means nothing to do
                let failed = matches!(state.error, Some(FeedError::SubscriptionFailure { .. }))
                    && state.subscription.is_none()
                    && !state.loading;
                if !failed {
                    debug!(%owner, "feed already open");
                    return;
                }
                info!(%owner, "resubscribing after live channel failure");
                state.generation = generation;
                state.loading = true;
                state.loading_more = false;
                state.refreshing = false;
                None
            } else {
                let previous = state.subscription.take();
                *state = FeedState {
                    owner: Some(owner.clone()),
                    generation,
                    epoch: state.epoch,
                    loading: true,
                    has_more: true,
                    ..Default::default()
                };
                previous
            };
            self.shared.publish(&state);
            (generation, previous)
        };

        if let Some(handle) = previous {
            handle.unsubscribe();
            info!("closed previous live subscription");
        }

        info!(%owner, generation, "opening feed");
        let shared = self.shared.clone();
        let callback: SnapshotCallback =
            Arc::new(move |result| shared.apply_live(generation, result));

        let result = self
            .collection
            .subscribe(&owner, self.shared.live_window, callback)
            .await;

        let stale = {
            let mut state = self.shared.state.lock();
            match result {
                Ok(handle) if state.is_current(generation) => {
                    state.subscription = Some(handle);
                    if matches!(state.error, Some(FeedError::SubscriptionFailure { .. })) {
                        state.error = None;
                        self.shared.publish(&state);
                    }
                    None
                }
                Ok(handle) => Some(handle),
                Err(e) => {
                    if state.is_current(generation) {
                        warn!(%owner, error = %e, "failed to open live subscription");
                        state.loading = false;
                        state.error = Some(FeedError::SubscriptionFailure {
                            message: e.to_string(),
                        });
                        self.shared.publish(&state);
                    }
                    None
                }
            }
        };

        if let Some(handle) = stale {
            debug!(%owner, "feed closed while subscribing, dropping subscription");
            handle.unsubscribe();
        }
    }

    /// Stop the live subscription and forget the held sequence.
    pub fn close(&self) {
        let handle = {
            let mut state = self.shared.state.lock();
            if state.owner.is_none() {
                return;
            }
            let handle = state.subscription.take();
            let generation = state.generation + 1;
            let owner = state.owner.take();
            *state = FeedState {
                generation,
                epoch: state.epoch,
                ..Default::default()
            };
            self.shared.publish(&state);
            info!(owner = ?owner, "feed closed");
            handle
        };

        if let Some(handle) = handle {
            handle.unsubscribe();
        }
    }

    /// Apply a full live result set for the open owner.
    pub fn on_live_update(&self, snapshot: Vec<JournalEntry>) {
        let generation = self.shared.state.lock().generation;
        self.shared.apply_live(generation, Ok(snapshot));
    }

    /// Fetch the next page past the backfill cursor.
    ///
    /// No-op when closed, at end of data, or while another backfill or a
    /// refresh is in flight.
    pub async fn load_more(&self) {
        let (owner, generation, epoch, cursor) = {
            let mut state = self.shared.state.lock();
            let Some(owner) = state.owner.clone() else {
                return;
            };
            if state.loading_more || state.refreshing {
                debug!(%owner, "backfill already in flight");
                return;
            }
            if !state.has_more {
                debug!(%owner, "no more pages");
                return;
            }
            state.loading_more = true;
            self.shared.publish(&state);
            (owner, state.generation, state.epoch, state.cursor.clone())
        };

        debug!(%owner, cursor = ?cursor, "fetching page");
        let result = self
            .collection
            .query_page(&owner, self.page_size, cursor.as_ref())
            .await;

        let mut state = self.shared.state.lock();
        if !state.is_current(generation) || state.epoch != epoch {
            debug!(%owner, "discarding stale page");
            return;
        }
        state.loading_more = false;
        match result {
            Ok(page) => {
                let fetched = page.entries.len();
                let added = state.accept_page(page, self.page_size, false);
                debug!(%owner, fetched, added, has_more = state.has_more, "page appended");
            }
            Err(e) => {
                warn!(%owner, error = %e, "page fetch failed");
                state.error = Some(FeedError::PageFetchFailure {
                    message: e.to_string(),
                });
            }
        }
        self.shared.publish(&state);
    }

    /// Start backfill over from the first page. The live subscription is left
    /// alone.
    pub async fn refresh(&self) {
        let (owner, generation, epoch) = {
            let mut state = self.shared.state.lock();
            let Some(owner) = state.owner.clone() else {
                return;
            };
            if state.refreshing {
                debug!(%owner, "refresh already in flight");
                return;
            }
            state.refreshing = true;
            state.loading_more = false;
            state.epoch += 1;
            self.shared.publish(&state);
            (owner, state.generation, state.epoch)
        };

        info!(%owner, "refreshing feed");
        let result = self.collection.query_page(&owner, self.page_size, None).await;

        let mut state = self.shared.state.lock();
        if !state.is_current(generation) || state.epoch != epoch {
            debug!(%owner, "discarding stale refresh");
            return;
        }
        state.refreshing = false;
        match result {
            Ok(page) => {
                let kept = state.accept_page(page, self.page_size, true);
                debug!(%owner, kept, entries = state.entries.len(), "refresh applied");
            }
            Err(e) => {
                warn!(%owner, error = %e, "refresh failed");
                state.error = Some(FeedError::PageFetchFailure {
                    message: e.to_string(),
                });
            }
        }
        self.shared.publish(&state);
    }

    /// Drop an entry from every partition after it was deleted.
    pub fn remove_entry(&self, id: &EntryId) -> bool {
        let mut state = self.shared.state.lock();
        let before = state.entries.len();
        state.live.retain(|e| &e.id != id);
        state.backfill.retain(|e| &e.id != id);
        state.rebuild();
        let removed = state.entries.len() != before;
        if removed {
            self.shared.publish(&state);
        }
        removed
    }

    /// Mirror a committed partial update into the held copies.
    pub fn apply_patch(&self, id: &EntryId, changes: &EntryChanges, updated_at: DateTime<Utc>) -> bool {
        let mut state = self.shared.state.lock();
        let mut found = false;
        let FeedState { live, backfill, .. } = &mut *state;
        for entry in live.iter_mut().chain(backfill.iter_mut()) {
            if &entry.id == id {
                changes.apply_to(entry, updated_at);
                found = true;
            }
        }
        if found {
            state.rebuild();
            self.shared.publish(&state);
        }
        found
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.shared.state.lock().to_snapshot()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.shared.state.lock().entries.clone()
    }

    /// Receiver that sees every published snapshot
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.shared.tx.subscribe()
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.shared.state.lock().owner.clone()
    }

    pub fn is_open(&self) -> bool {
        self.shared.state.lock().owner.is_some()
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.shared.state.lock().cursor.clone()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}
