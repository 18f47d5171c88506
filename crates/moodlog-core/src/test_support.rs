//! Fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::backend::{BlobStorage, Cursor, EntryCollection, Page, SnapshotCallback, Subscription};
use crate::error::BackendError;
use crate::models::{EntryChanges, EntryId, JournalEntry, NewRecord, OwnerId};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn make_entry(id: &str, owner: &str, mood: &str, secs: i64) -> JournalEntry {
    JournalEntry {
        id: EntryId::new(id),
        owner_id: OwnerId::new(owner),
        mood: mood.to_string(),
        text: format!("entry {}", id),
        image_ref: None,
        created_at: at(secs),
        updated_at: at(secs),
    }
}

pub fn page(entries: Vec<JournalEntry>, next_cursor: Option<&str>) -> Page {
    Page {
        entries,
        next_cursor: next_cursor.map(Cursor::new),
    }
}

/// Collection whose pages and live snapshots are driven by the test.
#[derive(Clone, Default)]
pub struct ScriptedCollection {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    pages: Mutex<VecDeque<Result<Page, BackendError>>>,
    page_requests: Mutex<Vec<(OwnerId, Option<Cursor>)>>,
    gated: AtomicBool,
    gate: Notify,
    live: Mutex<HashMap<OwnerId, Vec<JournalEntry>>>,
    callbacks: Mutex<HashMap<OwnerId, SnapshotCallback>>,
    subscribes: Mutex<Vec<OwnerId>>,
    unsubscribes: Mutex<HashMap<OwnerId, usize>>,
    fail_subscribe: AtomicBool,
    records: Mutex<HashMap<EntryId, JournalEntry>>,
    writes: AtomicUsize,
}

impl ScriptedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, result: Result<Page, BackendError>) {
        self.inner.pages.lock().push_back(result);
    }

    /// Make the next page request wait until `release_page` is called.
    pub fn hold_next_page(&self) {
        self.inner.gated.store(true, Ordering::SeqCst);
    }

    pub fn release_page(&self) {
        self.inner.gate.notify_one();
    }

    pub fn page_requests(&self) -> Vec<(OwnerId, Option<Cursor>)> {
        self.inner.page_requests.lock().clone()
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Replace the owner's live result set and notify its subscriber.
    pub fn push_live(&self, owner: &str, entries: Vec<JournalEntry>) {
        let owner = OwnerId::new(owner);
        self.inner.live.lock().insert(owner.clone(), entries.clone());
        let callback = self.inner.callbacks.lock().get(&owner).cloned();
        if let Some(callback) = callback {
            callback(Ok(entries));
        }
    }

    pub fn break_live(&self, owner: &str, error: BackendError) {
        let callback = self.inner.callbacks.lock().get(&OwnerId::new(owner)).cloned();
        if let Some(callback) = callback {
            callback(Err(error));
        }
    }

    pub fn callback_for(&self, owner: &str) -> Option<SnapshotCallback> {
        self.inner.callbacks.lock().get(&OwnerId::new(owner)).cloned()
    }

    pub fn subscribe_count(&self) -> usize {
        self.inner.subscribes.lock().len()
    }

    pub fn unsubscribe_count(&self, owner: &str) -> usize {
        self.inner
            .unsubscribes
            .lock()
            .get(&OwnerId::new(owner))
            .copied()
            .unwrap_or(0)
    }

    pub fn insert(&self, entry: JournalEntry) {
        self.inner.records.lock().insert(entry.id.clone(), entry);
    }

    /// Create, update and delete calls seen
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn record(&self, id: &EntryId) -> Option<JournalEntry> {
        self.inner.records.lock().get(id).cloned()
    }
}

#[async_trait]
impl EntryCollection for ScriptedCollection {
    async fn create(&self, record: NewRecord) -> Result<EntryId, BackendError> {
        let n = self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let id = EntryId::new(format!("created-{}", n));
        let now = Utc::now();
        self.insert(JournalEntry {
            id: id.clone(),
            owner_id: record.owner_id,
            mood: record.mood,
            text: record.text,
            image_ref: record.image_ref,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn update(
        &self,
        id: &EntryId,
        changes: EntryChanges,
    ) -> Result<DateTime<Utc>, BackendError> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.inner.records.lock();
        let entry = records
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound { id: id.to_string() })?;
        changes.apply_to(entry, Utc::now());
        Ok(entry.updated_at)
    }

    async fn delete(&self, id: &EntryId) -> Result<(), BackendError> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .records
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound { id: id.to_string() })
    }

    async fn get(&self, id: &EntryId) -> Result<Option<JournalEntry>, BackendError> {
        Ok(self.record(id))
    }

    async fn query_page(
        &self,
        owner: &OwnerId,
        _page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<Page, BackendError> {
        self.inner
            .page_requests
            .lock()
            .push((owner.clone(), cursor.cloned()));
        if self.inner.gated.swap(false, Ordering::SeqCst) {
            self.inner.gate.notified().await;
        }
        let next = self.inner.pages.lock().pop_front();
        next.unwrap_or_else(|| Ok(Page::default()))
    }

    async fn subscribe(
        &self,
        owner: &OwnerId,
        _limit: usize,
        on_change: SnapshotCallback,
    ) -> Result<Box<dyn Subscription>, BackendError> {
        self.inner.subscribes.lock().push(owner.clone());
        if self.inner.fail_subscribe.load(Ordering::SeqCst) {
            return Err(BackendError::PermissionDenied {
                message: "missing index".to_string(),
            });
        }
        self.inner
            .callbacks
            .lock()
            .insert(owner.clone(), on_change.clone());
        // Like a real listener, nothing arrives until the owner has a result set
        let initial = self.inner.live.lock().get(owner).cloned();
        if let Some(initial) = initial {
            on_change(Ok(initial));
        }
        Ok(Box::new(ScriptedSubscription {
            owner: owner.clone(),
            inner: self.inner.clone(),
        }))
    }

    async fn query_all(&self) -> Result<Vec<JournalEntry>, BackendError> {
        let mut all: Vec<JournalEntry> = self.inner.records.lock().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

struct ScriptedSubscription {
    owner: OwnerId,
    inner: Arc<ScriptedInner>,
}

impl Subscription for ScriptedSubscription {
    fn unsubscribe(self: Box<Self>) {
        self.inner.callbacks.lock().remove(&self.owner);
        *self
            .inner
            .unsubscribes
            .lock()
            .entry(self.owner.clone())
            .or_insert(0) += 1;
    }
}

/// Blob storage that records uploads and can be told to fail.
#[derive(Default)]
pub struct RecordingBlobs {
    uploads: Mutex<Vec<(OwnerId, String, usize)>>,
    fail: AtomicBool,
}

impl RecordingBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let blobs = Self::default();
        blobs.fail.store(true, Ordering::SeqCst);
        blobs
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.uploads.lock().iter().map(|(_, p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl BlobStorage for RecordingBlobs {
    async fn upload(
        &self,
        owner: &OwnerId,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BackendError> {
        self.uploads
            .lock()
            .push((owner.clone(), path.to_string(), bytes.len()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::network("upload interrupted"));
        }
        Ok(format!("https://blobs.test/{}", path))
    }
}
