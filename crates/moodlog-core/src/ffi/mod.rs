//! FFI module for UniFFI bindings
//!
//! Exposes a small synchronous API for Swift/Kotlin. Async core calls run on
//! a shared Tokio runtime and are blocked on; only plain records, enums and
//! strings cross the boundary.

use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::error::JournalError;
use crate::journal::JournalService;
use crate::models::{JournalEntry, Mood, TimeFilter, UserProfile};
use crate::runtime::CoreRuntime;
use crate::stats::{dominant_mood, MoodCounts};
use crate::store::{FeedSnapshot, FeedStore};

mod callback_api;
mod entries_api;
mod lifecycle_api;
mod profile_api;

/// Shared Tokio runtime for async operations in FFI
static TOKIO_RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

fn get_tokio_runtime() -> Result<&'static tokio::runtime::Runtime, MoodlogFfiError> {
    if let Some(rt) = TOKIO_RUNTIME.get() {
        return Ok(rt);
    }
    let rt = tokio::runtime::Runtime::new().map_err(|e| MoodlogFfiError::Internal {
        message: format!("Failed to create Tokio runtime: {}", e),
    })?;
    Ok(TOKIO_RUNTIME.get_or_init(|| rt))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiMood {
    Joyful,
    Sad,
    Angry,
    Calm,
}

impl From<Mood> for FfiMood {
    fn from(mood: Mood) -> Self {
        match mood {
            Mood::Joyful => Self::Joyful,
            Mood::Sad => Self::Sad,
            Mood::Angry => Self::Angry,
            Mood::Calm => Self::Calm,
        }
    }
}

impl From<FfiMood> for Mood {
    fn from(mood: FfiMood) -> Self {
        match mood {
            FfiMood::Joyful => Self::Joyful,
            FfiMood::Sad => Self::Sad,
            FfiMood::Angry => Self::Angry,
            FfiMood::Calm => Self::Calm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiTimeFilter {
    OneDay,
    SevenDays,
    ThirtyDays,
    AllTime,
}

impl From<FfiTimeFilter> for TimeFilter {
    fn from(filter: FfiTimeFilter) -> Self {
        match filter {
            FfiTimeFilter::OneDay => Self::OneDay,
            FfiTimeFilter::SevenDays => Self::SevenDays,
            FfiTimeFilter::ThirtyDays => Self::ThirtyDays,
            FfiTimeFilter::AllTime => Self::AllTime,
        }
    }
}

/// A journal entry as shown by the apps
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEntry {
    pub id: String,
    pub owner_id: String,
    /// Raw stored label
    pub mood: String,
    /// `None` when the stored label is not a known mood
    pub known_mood: Option<FfiMood>,
    pub text: String,
    pub image_ref: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl From<&JournalEntry> for FfiEntry {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            owner_id: entry.owner_id.to_string(),
            mood: entry.mood.clone(),
            known_mood: entry.mood().map(FfiMood::from),
            text: entry.text.clone(),
            image_ref: entry.image_ref.clone(),
            created_at_ms: entry.created_at.timestamp_millis(),
            updated_at_ms: entry.updated_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FeedView {
    pub entries: Vec<FfiEntry>,
    pub loading: bool,
    pub loading_more: bool,
    pub refreshing: bool,
    pub has_more: bool,
    pub error: Option<String>,
}

impl From<&FeedSnapshot> for FeedView {
    fn from(snapshot: &FeedSnapshot) -> Self {
        Self {
            entries: snapshot.entries.iter().map(FfiEntry::from).collect(),
            loading: snapshot.loading,
            loading_more: snapshot.loading_more,
            refreshing: snapshot.refreshing,
            has_more: snapshot.has_more,
            error: snapshot.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct MoodCountsView {
    pub joyful: u64,
    pub sad: u64,
    pub angry: u64,
    pub calm: u64,
    pub total: u64,
    pub dominant: Option<FfiMood>,
}

impl From<MoodCounts> for MoodCountsView {
    fn from(counts: MoodCounts) -> Self {
        Self {
            joyful: counts.get(Mood::Joyful),
            sad: counts.get(Mood::Sad),
            angry: counts.get(Mood::Angry),
            calm: counts.get(Mood::Calm),
            total: counts.total(),
            dominant: dominant_mood(&counts).map(FfiMood::from),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
    pub photo_url: Option<String>,
    pub created_at_ms: Option<i64>,
}

impl From<&UserProfile> for FfiUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.to_string(),
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            is_admin: profile.role.is_admin(),
            photo_url: profile.photo_url.clone(),
            created_at_ms: profile.created_at.map(|at| at.timestamp_millis()),
        }
    }
}

/// Errors that can occur during moodlog operations.
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MoodlogFfiError {
    #[error("Core not initialized")]
    CoreNotInitialized,
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("{message}")]
    Validation { message: String },
    #[error("Image upload failed: {message}")]
    UploadFailed { message: String },
    #[error("Not allowed: {message}")]
    Forbidden { message: String },
    #[error("Entry not found: {id}")]
    NotFound { id: String },
    #[error("Backend error: {message}")]
    Backend { message: String },
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<JournalError> for MoodlogFfiError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Validation(e) => Self::Validation {
                message: e.to_string(),
            },
            JournalError::UploadFailed { message } => Self::UploadFailed { message },
            JournalError::NotLoggedIn => Self::NotLoggedIn,
            JournalError::Forbidden { message } => Self::Forbidden { message },
            JournalError::NotFound { id } => Self::NotFound { id },
            JournalError::Backend(e) => Self::Backend {
                message: e.to_string(),
            },
        }
    }
}

/// Callback interface for feed notifications to Swift/Kotlin.
///
/// Invoked from a background thread; implementations should hop to the main
/// thread before touching UI.
#[uniffi::export(callback_interface)]
pub trait FeedCallback: Send + Sync {
    fn on_feed_changed(&self, feed: FeedView);
}

/// Mood journal core exposed to foreign languages.
#[derive(uniffi::Object)]
pub struct MoodlogCore {
    runtime: RwLock<Option<CoreRuntime>>,
    /// Task forwarding feed snapshots to the registered callback
    callback_task: Mutex<Option<JoinHandle<()>>>,
}

impl MoodlogCore {
    fn feed_store(&self) -> Result<Arc<FeedStore>, MoodlogFfiError> {
        self.runtime
            .read()
            .as_ref()
            .map(|rt| rt.feed())
            .ok_or(MoodlogFfiError::CoreNotInitialized)
    }

    fn journal(&self) -> Result<Arc<JournalService>, MoodlogFfiError> {
        self.runtime
            .read()
            .as_ref()
            .map(|rt| rt.journal())
            .ok_or(MoodlogFfiError::CoreNotInitialized)
    }

    fn stop_callback_task(&self) {
        if let Some(task) = self.callback_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for MoodlogCore {
    fn drop(&mut self) {
        self.stop_callback_task();
        if let Some(mut runtime) = self.runtime.write().take() {
            runtime.shutdown();
        }
    }
}
