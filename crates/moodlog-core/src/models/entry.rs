use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Mood;
use crate::error::ValidationError;

/// Backend-assigned entry identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of the user who owns an entry
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A journal entry as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: EntryId,
    pub owner_id: OwnerId,
    /// Raw stored label. Kept as written so entries from other clients with
    /// labels outside `Mood` still round-trip; see `mood()`.
    pub mood: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn mood(&self) -> Option<Mood> {
        Mood::parse(&self.mood)
    }

    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.image_ref.is_some()
    }
}

/// Local image picked for an entry, not yet uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// What the user filled in on the new-entry form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    pub mood: Option<Mood>,
    pub text: String,
    pub image: Option<ImageUpload>,
}

impl EntryDraft {
    pub fn new(mood: Mood) -> Self {
        Self {
            mood: Some(mood),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn image(mut self, image: ImageUpload) -> Self {
        self.image = Some(image);
        self
    }

    /// Returns the mood to store if the draft may be committed.
    pub fn validate(&self) -> Result<Mood, ValidationError> {
        let mood = self.mood.ok_or(ValidationError::MissingMood)?;
        if self.text.trim().is_empty() && self.image.is_none() {
            return Err(ValidationError::EmptyEntry);
        }
        Ok(mood)
    }
}

/// Partial edit of an existing entry. Owner and timestamps are immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub mood: Option<Mood>,
    pub text: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.mood.is_none() && self.text.is_none()
    }

    /// True when the patch would leave the entry with no text
    pub fn clears_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| t.trim().is_empty())
    }
}

/// Record handed to the backend on create; id and timestamps are assigned remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub owner_id: OwnerId,
    pub mood: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

/// Fields changed by a partial update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl From<&EntryPatch> for EntryChanges {
    fn from(patch: &EntryPatch) -> Self {
        Self {
            mood: patch.mood.map(|m| m.label().to_string()),
            text: patch.text.as_ref().map(|t| t.trim().to_string()),
        }
    }
}

impl EntryChanges {
    /// Apply these changes to a held copy of the entry
    pub fn apply_to(&self, entry: &mut JournalEntry, updated_at: DateTime<Utc>) {
        if let Some(mood) = &self.mood {
            entry.mood = mood.clone();
        }
        if let Some(text) = &self.text {
            entry.text = text.clone();
        }
        entry.updated_at = updated_at;
    }
}
