//! Error types shared across the core.
//!
//! Backend failures are plain values the remote collaborator hands back.
//! Feed failures are never returned to callers; they live in the feed state
//! so the presentation layer can render them. Write-path failures are
//! returned from `JournalService`.

/// Failure reported by the remote collection or blob storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {message}")]
    Network { message: String },
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },
    #[error("Record not found: {id}")]
    NotFound { id: String },
    #[error("Storage error: {message}")]
    Storage { message: String },
    #[error("Invalid cursor: {cursor}")]
    InvalidCursor { cursor: String },
}

impl BackendError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Terminal failure state of the feed store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("Live subscription failed: {message}")]
    SubscriptionFailure { message: String },
    #[error("Page fetch failed: {message}")]
    PageFetchFailure { message: String },
}

/// Caller-side validation of an entry before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("A mood is required")]
    MissingMood,
    #[error("Please add text or pick an image")]
    EmptyEntry,
    #[error("Nothing to update")]
    EmptyPatch,
    #[error("A user id is required")]
    MissingUserId,
    #[error("User ids may not contain '/', '\\' or '..'")]
    InvalidUserId,
}

/// Errors returned by the journal write path.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Image upload failed: {message}")]
    UploadFailed { message: String },
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Not allowed: {message}")]
    Forbidden { message: String },
    #[error("Entry not found: {id}")]
    NotFound { id: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
}
