//! Seam to the managed backend: the entry collection, the user directory and
//! blob storage.
//!
//! Every query form orders by `created_at` descending, ties broken by the
//! backend's id order. Implementations scope queries to the owner; the core
//! never filters other users' entries itself.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::models::{EntryChanges, EntryId, JournalEntry, NewRecord, OwnerId, UserProfile};

pub use memory::MemoryBackend;

/// Opaque position in an ordered result set. Passed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a paged query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub entries: Vec<JournalEntry>,
    /// `None` once the end of the collection is reached
    pub next_cursor: Option<Cursor>,
}

/// Invoked with the full current result set on every remote change, or
/// with an error when the channel drops.
pub type SnapshotCallback =
    Arc<dyn Fn(Result<Vec<JournalEntry>, BackendError>) + Send + Sync>;

/// Handle to a standing live query
pub trait Subscription: Send {
    /// Stop delivering snapshots. Consumes the handle so it runs once.
    fn unsubscribe(self: Box<Self>);
}

#[async_trait]
pub trait EntryCollection: Send + Sync {
    async fn create(&self, record: NewRecord) -> Result<EntryId, BackendError>;

    /// Apply a partial update. Returns the `updated_at` the backend stored.
    async fn update(
        &self,
        id: &EntryId,
        changes: EntryChanges,
    ) -> Result<DateTime<Utc>, BackendError>;

    async fn delete(&self, id: &EntryId) -> Result<(), BackendError>;

    async fn get(&self, id: &EntryId) -> Result<Option<JournalEntry>, BackendError>;

    async fn query_page(
        &self,
        owner: &OwnerId,
        page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<Page, BackendError>;

    /// Live variant of the owner query, bounded to the newest `limit` entries.
    /// The callback fires once with the current set right after subscribing.
    async fn subscribe(
        &self,
        owner: &OwnerId,
        limit: usize,
        on_change: SnapshotCallback,
    ) -> Result<Box<dyn Subscription>, BackendError>;

    /// Every entry of every owner (admin dashboard)
    async fn query_all(&self) -> Result<Vec<JournalEntry>, BackendError>;
}

/// Registered users and their roles, read back on every sign in.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Store a new user. An id that is already registered keeps its stored
    /// profile, which is returned unchanged.
    async fn register(&self, profile: UserProfile) -> Result<UserProfile, BackendError>;

    async fn get_profile(&self, id: &OwnerId) -> Result<Option<UserProfile>, BackendError>;

    /// Every registered user, oldest registration first
    async fn list_profiles(&self) -> Result<Vec<UserProfile>, BackendError>;

    async fn set_photo(&self, id: &OwnerId, photo_url: String)
        -> Result<UserProfile, BackendError>;
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` at `path` and return a durable reference to them
    async fn upload(
        &self,
        owner: &OwnerId,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError>;
}
