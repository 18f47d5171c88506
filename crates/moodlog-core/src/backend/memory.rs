//! In-process backend.
//!
//! Implements the entry collection, the user directory and blob storage on
//! top of locked vectors. With a data directory it persists entries to
//! `entries.json`, users to `users.json` and blobs under `blobs/` after every
//! mutation, which is what the CLI and the FFI layer run against. Without one
//! it is purely in memory (tests).

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{
    BlobStorage, Cursor, EntryCollection, Page, ProfileDirectory, SnapshotCallback, Subscription,
};
use crate::constants::{BLOBS_DIR, ENTRIES_FILE, USERS_FILE};
use crate::error::BackendError;
use crate::models::{EntryChanges, EntryId, JournalEntry, NewRecord, OwnerId, UserProfile};

#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<BackendState>,
    data_dir: Option<PathBuf>,
    offline: AtomicBool,
    next_subscriber_id: AtomicU64,
}

#[derive(Default)]
struct BackendState {
    /// Kept sorted newest first
    entries: Vec<JournalEntry>,
    /// In registration order
    profiles: Vec<UserProfile>,
    blobs: HashMap<String, Vec<u8>>,
    subscribers: Vec<Subscriber>,
    last_created_at: Option<DateTime<Utc>>,
    /// Stamped on every snapshot handed to subscribers
    snapshot_seq: u64,
}

/// Sequence number of the newest snapshot a subscriber has been given.
/// Reentrant so a callback may write back into the backend.
type DeliveryGate = Arc<ReentrantMutex<Cell<u64>>>;

struct Subscriber {
    id: u64,
    owner: OwnerId,
    limit: usize,
    callback: SnapshotCallback,
    gate: DeliveryGate,
}

struct Notification {
    seq: u64,
    callback: SnapshotCallback,
    gate: DeliveryGate,
    snapshot: Vec<JournalEntry>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_state(BackendState::default(), None)
    }

    /// Open a persistent backend in `data_dir`. A missing file is an empty
    /// collection; an unreadable one is an error so it is never overwritten.
    pub fn open(data_dir: &Path) -> Result<Self, BackendError> {
        fs::create_dir_all(data_dir)
            .map_err(|e| BackendError::storage(format!("{}: {}", data_dir.display(), e)))?;

        let mut entries: Vec<JournalEntry> = load_json(&data_dir.join(ENTRIES_FILE))?;
        sort_newest_first(&mut entries);
        let profiles: Vec<UserProfile> = load_json(&data_dir.join(USERS_FILE))?;

        debug!(
            data_dir = %data_dir.display(),
            entries = entries.len(),
            users = profiles.len(),
            "opened local backend"
        );
        let last_created_at = entries.iter().map(|e| e.created_at).max();
        let state = BackendState {
            entries,
            profiles,
            last_created_at,
            ..Default::default()
        };
        Ok(Self::with_state(state, Some(data_dir.to_path_buf())))
    }

    fn with_state(state: BackendState, data_dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                data_dir,
                offline: AtomicBool::new(false),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    /// Simulate losing the connection: every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Insert a fully formed entry, keeping its id and timestamps.
    pub fn insert_entry(&self, entry: JournalEntry) -> Result<(), BackendError> {
        let owner = entry.owner_id.clone();
        let notifications = {
            let mut state = self.inner.state.lock();
            let id = entry.id.clone();
            let existing = state.entries.iter().position(|e| e.id == id);
            let replaced = existing.map(|idx| state.entries.remove(idx));
            let last_created_at = state.last_created_at;
            state.last_created_at = Some(
                last_created_at.map_or(entry.created_at, |last| last.max(entry.created_at)),
            );
            state.entries.push(entry);
            sort_newest_first(&mut state.entries);
            if let Err(e) = self.persist(&state) {
                state.entries.retain(|e| e.id != id);
                state.entries.extend(replaced);
                sort_newest_first(&mut state.entries);
                state.last_created_at = last_created_at;
                return Err(e);
            }
            collect_notifications(&mut state, &owner)
        };
        deliver(notifications);
        Ok(())
    }

    /// Remove an entry behind the feed's back (another device deleting it).
    /// `Ok(None)` when there was no such entry.
    pub fn remove_entry(&self, id: &EntryId) -> Result<Option<JournalEntry>, BackendError> {
        let (removed, notifications) = {
            let mut state = self.inner.state.lock();
            let Some(idx) = state.entries.iter().position(|e| &e.id == id) else {
                return Ok(None);
            };
            let removed = state.entries.remove(idx);
            if let Err(e) = self.persist(&state) {
                state.entries.insert(idx, removed);
                return Err(e);
            }
            let notifications = collect_notifications(&mut state, &removed.owner_id);
            (removed, notifications)
        };
        deliver(notifications);
        Ok(Some(removed))
    }

    pub fn entry_count(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    pub fn blob(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.state.lock().blobs.get(path).cloned()
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(BackendError::network("backend unreachable"));
        }
        Ok(())
    }

    fn persist(&self, state: &BackendState) -> Result<(), BackendError> {
        match &self.inner.data_dir {
            Some(dir) => save_json(&dir.join(ENTRIES_FILE), &state.entries),
            None => Ok(()),
        }
    }

    fn persist_profiles(&self, state: &BackendState) -> Result<(), BackendError> {
        match &self.inner.data_dir {
            Some(dir) => save_json(&dir.join(USERS_FILE), &state.profiles),
            None => Ok(()),
        }
    }

    /// Server-side timestamp, strictly increasing across creates
    fn assign_created_at(state: &mut BackendState) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match state.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        state.last_created_at = Some(at);
        at
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, BackendError> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
            BackendError::storage(format!("Failed to parse {}: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(BackendError::storage(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

fn save_json<T: Serialize>(path: &Path, items: &[T]) -> Result<(), BackendError> {
    let json =
        serde_json::to_string_pretty(items).map_err(|e| BackendError::storage(e.to_string()))?;
    fs::write(path, json).map_err(|e| {
        BackendError::storage(format!("Failed to save {}: {}", path.display(), e))
    })
}

/// Blob paths are relative and may not climb out of the blob directory.
fn is_contained(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

fn sort_newest_first(entries: &mut [JournalEntry]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn encode_cursor(entry: &JournalEntry) -> Cursor {
    Cursor::new(format!(
        "{}|{}",
        entry.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        entry.id
    ))
}

fn decode_cursor(cursor: &Cursor) -> Result<(DateTime<Utc>, EntryId), BackendError> {
    let invalid = || BackendError::InvalidCursor {
        cursor: cursor.as_str().to_string(),
    };
    let (at, id) = cursor.as_str().split_once('|').ok_or_else(invalid)?;
    let at = DateTime::parse_from_rfc3339(at)
        .map_err(|_| invalid())?
        .with_timezone(&Utc);
    Ok((at, EntryId::new(id)))
}

fn owner_snapshot(state: &BackendState, owner: &OwnerId, limit: usize) -> Vec<JournalEntry> {
    state
        .entries
        .iter()
        .filter(|e| &e.owner_id == owner)
        .take(limit)
        .cloned()
        .collect()
}

fn collect_notifications(state: &mut BackendState, owner: &OwnerId) -> Vec<Notification> {
    state.snapshot_seq += 1;
    let seq = state.snapshot_seq;
    state
        .subscribers
        .iter()
        .filter(|s| &s.owner == owner)
        .map(|s| Notification {
            seq,
            callback: s.callback.clone(),
            gate: s.gate.clone(),
            snapshot: owner_snapshot(state, owner, s.limit),
        })
        .collect()
}

/// Callbacks run after the state lock is released so they may call back in.
/// Concurrent writers can reach this in any order; a snapshot older than one
/// the subscriber already received is dropped.
fn deliver(notifications: Vec<Notification>) {
    for notification in notifications {
        let delivered = notification.gate.lock();
        if delivered.get() >= notification.seq {
            debug!(seq = notification.seq, "dropping superseded live snapshot");
            continue;
        }
        delivered.set(notification.seq);
        (notification.callback)(Ok(notification.snapshot));
    }
}

#[async_trait]
impl EntryCollection for MemoryBackend {
    async fn create(&self, record: NewRecord) -> Result<EntryId, BackendError> {
        self.check_online()?;
        let owner = record.owner_id.clone();
        let (id, notifications) = {
            let mut state = self.inner.state.lock();
            let created_at = Self::assign_created_at(&mut state);
            let id = EntryId::new(uuid::Uuid::new_v4().to_string());
            state.entries.push(JournalEntry {
                id: id.clone(),
                owner_id: record.owner_id,
                mood: record.mood,
                text: record.text,
                image_ref: record.image_ref,
                created_at,
                updated_at: created_at,
            });
            sort_newest_first(&mut state.entries);
            if let Err(e) = self.persist(&state) {
                state.entries.retain(|e| e.id != id);
                return Err(e);
            }
            (id, collect_notifications(&mut state, &owner))
        };
        debug!(%id, %owner, "created entry");
        deliver(notifications);
        Ok(id)
    }

    async fn update(
        &self,
        id: &EntryId,
        changes: EntryChanges,
    ) -> Result<DateTime<Utc>, BackendError> {
        self.check_online()?;
        let (updated_at, notifications) = {
            let mut state = self.inner.state.lock();
            let entry = state
                .entries
                .iter_mut()
                .find(|e| &e.id == id)
                .ok_or_else(|| BackendError::NotFound { id: id.to_string() })?;
            let original = entry.clone();
            let updated_at = Utc::now().max(entry.created_at);
            changes.apply_to(entry, updated_at);
            let owner = entry.owner_id.clone();
            if let Err(e) = self.persist(&state) {
                if let Some(entry) = state.entries.iter_mut().find(|e| &e.id == id) {
                    *entry = original;
                }
                return Err(e);
            }
            (updated_at, collect_notifications(&mut state, &owner))
        };
        debug!(%id, "updated entry");
        deliver(notifications);
        Ok(updated_at)
    }

    async fn delete(&self, id: &EntryId) -> Result<(), BackendError> {
        self.check_online()?;
        let notifications = {
            let mut state = self.inner.state.lock();
            let idx = state
                .entries
                .iter()
                .position(|e| &e.id == id)
                .ok_or_else(|| BackendError::NotFound { id: id.to_string() })?;
            let removed = state.entries.remove(idx);
            if let Err(e) = self.persist(&state) {
                state.entries.insert(idx, removed);
                return Err(e);
            }
            collect_notifications(&mut state, &removed.owner_id)
        };
        debug!(%id, "deleted entry");
        deliver(notifications);
        Ok(())
    }

    async fn get(&self, id: &EntryId) -> Result<Option<JournalEntry>, BackendError> {
        self.check_online()?;
        let state = self.inner.state.lock();
        Ok(state.entries.iter().find(|e| &e.id == id).cloned())
    }

    async fn query_page(
        &self,
        owner: &OwnerId,
        page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<Page, BackendError> {
        self.check_online()?;
        let after = cursor.map(decode_cursor).transpose()?;
        let state = self.inner.state.lock();

        let mut remaining = state
            .entries
            .iter()
            .filter(|e| &e.owner_id == owner)
            .filter(|e| match &after {
                Some((at, id)) => (e.created_at, &e.id) < (*at, id),
                None => true,
            });

        let entries: Vec<JournalEntry> = remaining.by_ref().take(page_size).cloned().collect();
        let has_more = remaining.next().is_some();
        let next_cursor = if has_more && entries.len() == page_size {
            entries.last().map(encode_cursor)
        } else {
            None
        };

        Ok(Page {
            entries,
            next_cursor,
        })
    }

    async fn subscribe(
        &self,
        owner: &OwnerId,
        limit: usize,
        on_change: SnapshotCallback,
    ) -> Result<Box<dyn Subscription>, BackendError> {
        self.check_online()?;
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let initial = {
            let mut state = self.inner.state.lock();
            let gate: DeliveryGate = Arc::new(ReentrantMutex::new(Cell::new(0)));
            state.snapshot_seq += 1;
            let initial = Notification {
                seq: state.snapshot_seq,
                callback: on_change.clone(),
                gate: gate.clone(),
                snapshot: owner_snapshot(&state, owner, limit),
            };
            state.subscribers.push(Subscriber {
                id,
                owner: owner.clone(),
                limit,
                callback: on_change,
                gate,
            });
            initial
        };
        debug!(subscription = id, %owner, limit, "live query registered");
        deliver(vec![initial]);

        Ok(Box::new(MemorySubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }))
    }

    async fn query_all(&self) -> Result<Vec<JournalEntry>, BackendError> {
        self.check_online()?;
        Ok(self.inner.state.lock().entries.clone())
    }
}

#[async_trait]
impl ProfileDirectory for MemoryBackend {
    async fn register(&self, mut profile: UserProfile) -> Result<UserProfile, BackendError> {
        self.check_online()?;
        let mut state = self.inner.state.lock();
        if let Some(existing) = state.profiles.iter().find(|p| p.id == profile.id) {
            debug!(user = %profile.id, "already registered");
            return Ok(existing.clone());
        }
        profile.created_at = Some(Utc::now());
        state.profiles.push(profile.clone());
        if let Err(e) = self.persist_profiles(&state) {
            state.profiles.pop();
            return Err(e);
        }
        debug!(user = %profile.id, role = ?profile.role, "registered user");
        Ok(profile)
    }

    async fn get_profile(&self, id: &OwnerId) -> Result<Option<UserProfile>, BackendError> {
        self.check_online()?;
        let state = self.inner.state.lock();
        Ok(state.profiles.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, BackendError> {
        self.check_online()?;
        Ok(self.inner.state.lock().profiles.clone())
    }

    async fn set_photo(
        &self,
        id: &OwnerId,
        photo_url: String,
    ) -> Result<UserProfile, BackendError> {
        self.check_online()?;
        let mut state = self.inner.state.lock();
        let idx = state
            .profiles
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| BackendError::NotFound { id: id.to_string() })?;
        let previous = state.profiles[idx].photo_url.replace(photo_url);
        if let Err(e) = self.persist_profiles(&state) {
            state.profiles[idx].photo_url = previous;
            return Err(e);
        }
        Ok(state.profiles[idx].clone())
    }
}

#[async_trait]
impl BlobStorage for MemoryBackend {
    async fn upload(
        &self,
        owner: &OwnerId,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        self.check_online()?;
        if !is_contained(path) {
            return Err(BackendError::PermissionDenied {
                message: format!("blob path escapes storage: {}", path),
            });
        }
        let size = bytes.len();
        let reference = match &self.inner.data_dir {
            Some(dir) => {
                let target = dir.join(BLOBS_DIR).join(path);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| BackendError::storage(e.to_string()))?;
                }
                fs::write(&target, &bytes)
                    .map_err(|e| BackendError::storage(format!("Failed to store blob: {}", e)))?;
                format!("file://{}", target.display())
            }
            None => format!("memory://{}", path),
        };
        self.inner.state.lock().blobs.insert(path.to_string(), bytes);
        debug!(%owner, path, size, content_type, "stored blob");
        Ok(reference)
    }
}

struct MemorySubscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription for MemorySubscription {
    fn unsubscribe(self: Box<Self>) {
        // Removal happens in Drop
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.state.lock().subscribers.retain(|s| s.id != self.id);
            debug!(subscription = self.id, "live query removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn record(owner: &str, text: &str) -> NewRecord {
        NewRecord {
            owner_id: OwnerId::new(owner),
            mood: "calm".to_string(),
            text: text.to_string(),
            image_ref: None,
        }
    }

    #[tokio::test]
    async fn test_created_at_is_strictly_increasing() {
        let backend = MemoryBackend::new();
        for i in 0..20 {
            backend.create(record("u1", &format!("e{}", i))).await.unwrap();
        }
        let all = backend.query_all().await.unwrap();
        for pair in all.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
        assert_eq!(all[0].text, "e19");
    }

    #[tokio::test]
    async fn test_pages_walk_whole_collection_for_owner() {
        let backend = MemoryBackend::new();
        for i in 0..7 {
            backend.create(record("u1", &format!("mine-{}", i))).await.unwrap();
            backend.create(record("u2", &format!("theirs-{}", i))).await.unwrap();
        }
        let owner = OwnerId::new("u1");

        let first = backend.query_page(&owner, 3, None).await.unwrap();
        assert_eq!(first.entries.len(), 3);
        assert_eq!(first.entries[0].text, "mine-6");
        let cursor = first.next_cursor.clone().unwrap();

        let second = backend.query_page(&owner, 3, Some(&cursor)).await.unwrap();
        assert_eq!(second.entries[0].text, "mine-3");
        let third = backend
            .query_page(&owner, 3, second.next_cursor.as_ref())
            .await
            .unwrap();
        assert_eq!(third.entries.len(), 1);
        assert_eq!(third.entries[0].text, "mine-0");
        assert!(third.next_cursor.is_none());
        assert!(third.entries.iter().all(|e| e.owner_id == owner));
    }

    #[tokio::test]
    async fn test_full_last_page_has_no_cursor() {
        let backend = MemoryBackend::new();
        for i in 0..4 {
            backend.create(record("u1", &format!("e{}", i))).await.unwrap();
        }
        let page = backend
            .query_page(&OwnerId::new("u1"), 4, None)
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 4);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_invalid_cursor() {
        let backend = MemoryBackend::new();
        let err = backend
            .query_page(&OwnerId::new("u1"), 3, Some(&Cursor::new("garbage")))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidCursor { .. }));
    }

    #[tokio::test]
    async fn test_subscription_receives_bounded_snapshots_until_dropped() {
        let backend = MemoryBackend::new();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: SnapshotCallback = Arc::new(move |snapshot| {
            sink.lock().push(snapshot.map(|s| s.len()).unwrap_or(usize::MAX));
        });

        let sub = backend
            .subscribe(&OwnerId::new("u1"), 2, callback)
            .await
            .unwrap();
        backend.create(record("u1", "a")).await.unwrap();
        backend.create(record("u2", "other owner")).await.unwrap();
        backend.create(record("u1", "b")).await.unwrap();
        backend.create(record("u1", "c")).await.unwrap();
        assert_eq!(*seen.lock(), vec![0, 1, 2, 2]);
        assert_eq!(backend.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(backend.subscriber_count(), 0);
        backend.create(record("u1", "d")).await.unwrap();
        assert_eq!(seen.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let backend = MemoryBackend::new();
        let id = backend.create(record("u1", "first")).await.unwrap();
        backend
            .update(
                &id,
                EntryChanges {
                    mood: Some("sad".to_string()),
                    text: None,
                },
            )
            .await
            .unwrap();
        let entry = backend.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.mood, "sad");
        assert_eq!(entry.text, "first");
        assert!(entry.updated_at >= entry.created_at);

        backend.delete(&id).await.unwrap();
        assert!(backend.get(&id).await.unwrap().is_none());
        assert!(matches!(
            backend.delete(&id).await,
            Err(BackendError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        assert!(matches!(
            backend.create(record("u1", "x")).await,
            Err(BackendError::Network { .. })
        ));
        assert_eq!(backend.entry_count(), 0);
        backend.set_offline(false);
        assert!(backend.create(record("u1", "x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_persists_entries_and_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let backend = MemoryBackend::open(dir.path()).unwrap();
            let reference = backend
                .upload(&OwnerId::new("u1"), "images/u1/1.jpg", vec![9, 9], "image/jpeg")
                .await
                .unwrap();
            assert!(reference.starts_with("file://"));
            let mut rec = record("u1", "persisted");
            rec.image_ref = Some(reference);
            backend.create(rec).await.unwrap()
        };

        assert!(dir.path().join(BLOBS_DIR).join("images/u1/1.jpg").exists());
        let reopened = MemoryBackend::open(dir.path()).unwrap();
        let entry = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.text, "persisted");
        assert!(entry.image_ref.is_some());

        let next = reopened.create(record("u1", "later")).await.unwrap();
        let later = reopened.get(&next).await.unwrap().unwrap();
        assert!(later.created_at > entry.created_at);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(ENTRIES_FILE), "not json").unwrap();
        assert!(matches!(
            MemoryBackend::open(dir.path()),
            Err(BackendError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_returns_stored_timestamp() {
        let backend = MemoryBackend::new();
        let id = backend.create(record("u1", "first")).await.unwrap();
        let changes = EntryChanges {
            mood: None,
            text: Some("second".to_string()),
        };
        let updated_at = backend.update(&id, changes).await.unwrap();
        let entry = backend.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.updated_at, updated_at);
    }

    #[tokio::test]
    async fn test_older_snapshot_is_not_delivered_after_newer() {
        let backend = MemoryBackend::new();
        let owner = OwnerId::new("u1");
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: SnapshotCallback = Arc::new(move |snapshot| {
            sink.lock().push(snapshot.map(|s| s.len()).unwrap_or(usize::MAX));
        });
        let _sub = backend.subscribe(&owner, 10, callback).await.unwrap();
        let first = backend.create(record("u1", "a")).await.unwrap();
        let template = backend.get(&first).await.unwrap().unwrap();

        // Two writers collect under the lock, then race to deliver.
        let (older, newer) = {
            let mut state = backend.inner.state.lock();
            let mut b = template.clone();
            b.id = EntryId::new("b");
            b.created_at = template.created_at + Duration::seconds(1);
            state.entries.push(b);
            sort_newest_first(&mut state.entries);
            let older = collect_notifications(&mut state, &owner);

            let mut c = template.clone();
            c.id = EntryId::new("c");
            c.created_at = template.created_at + Duration::seconds(2);
            state.entries.push(c);
            sort_newest_first(&mut state.entries);
            let newer = collect_notifications(&mut state, &owner);
            (older, newer)
        };
        deliver(newer);
        deliver(older);

        assert_eq!(*seen.lock(), vec![0, 1, 3]);
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_direct_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::open(dir.path()).unwrap();
        let id = backend.create(record("u1", "kept")).await.unwrap();
        let kept = backend.get(&id).await.unwrap().unwrap();

        // A directory where the file should be makes every save fail.
        let path = dir.path().join(ENTRIES_FILE);
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let mut extra = kept.clone();
        extra.id = EntryId::new("extra");
        extra.created_at = kept.created_at + Duration::seconds(5);
        assert!(backend.insert_entry(extra).is_err());
        assert_eq!(backend.entry_count(), 1);

        let mut rewritten = kept.clone();
        rewritten.text = "rewritten".to_string();
        assert!(backend.insert_entry(rewritten).is_err());
        assert_eq!(backend.get(&id).await.unwrap().unwrap().text, "kept");

        assert!(backend.remove_entry(&id).is_err());
        assert!(backend.get(&id).await.unwrap().is_some());
        assert!(backend.remove_entry(&EntryId::new("missing")).unwrap().is_none());

        let next = backend.create(record("u1", "after")).await;
        assert!(next.is_err());
        assert_eq!(backend.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_user_directory_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = MemoryBackend::open(dir.path()).unwrap();
            let admin = backend
                .register(UserProfile::new("root").with_role(Role::Admin))
                .await
                .unwrap();
            assert!(admin.created_at.is_some());
            backend.register(UserProfile::new("alice")).await.unwrap();

            // Registering again keeps what is stored.
            let again = backend.register(UserProfile::new("root")).await.unwrap();
            assert_eq!(again.role, Role::Admin);

            let updated = backend
                .set_photo(&OwnerId::new("alice"), "file:///a.jpg".to_string())
                .await
                .unwrap();
            assert_eq!(updated.photo_url.as_deref(), Some("file:///a.jpg"));
        }

        let reopened = MemoryBackend::open(dir.path()).unwrap();
        let ids: Vec<String> = reopened
            .list_profiles()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, vec!["root", "alice"]);
        let alice = reopened
            .get_profile(&OwnerId::new("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.photo_url.as_deref(), Some("file:///a.jpg"));
        assert!(reopened
            .get_profile(&OwnerId::new("bob"))
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            reopened
                .set_photo(&OwnerId::new("bob"), "x".to_string())
                .await,
            Err(BackendError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_blob_path_stays_inside_storage() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::open(&dir.path().join("store")).unwrap();
        let owner = OwnerId::new("u1");
        for path in ["../../escape.jpg", "/tmp/abs.jpg", "images/../../x.jpg", ""] {
            assert!(
                matches!(
                    backend.upload(&owner, path, vec![1], "image/jpeg").await,
                    Err(BackendError::PermissionDenied { .. })
                ),
                "{path}"
            );
        }
        assert!(!dir.path().join("escape.jpg").exists());
    }
}
