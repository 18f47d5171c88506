//! Write path: create, edit and delete entries for the signed-in user.
//!
//! Validation runs before any remote call. An image is uploaded before the
//! record is created, and a failed upload aborts the create. Edits and
//! deletes are mirrored into the feed store once the backend accepts them.
//! Profile photos go through the same upload step as entry images.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backend::{BlobStorage, EntryCollection, ProfileDirectory};
use crate::error::{JournalError, ValidationError};
use crate::models::{
    EntryChanges, EntryDraft, EntryId, EntryPatch, ImageUpload, JournalEntry, NewRecord,
    TimeFilter, UserProfile,
};
use crate::session::Session;
use crate::stats::{compute_mood_counts_for, MoodCounts};
use crate::store::FeedStore;
use crate::upload::upload_image;

pub struct JournalService {
    collection: Arc<dyn EntryCollection>,
    blobs: Arc<dyn BlobStorage>,
    profiles: Arc<dyn ProfileDirectory>,
    feed: Arc<FeedStore>,
    session: Session,
}

impl JournalService {
    pub fn new(
        collection: Arc<dyn EntryCollection>,
        blobs: Arc<dyn BlobStorage>,
        profiles: Arc<dyn ProfileDirectory>,
        feed: Arc<FeedStore>,
        session: Session,
    ) -> Self {
        Self {
            collection,
            blobs,
            profiles,
            feed,
            session,
        }
    }

    fn require_user(&self) -> Result<UserProfile, JournalError> {
        self.session.current().ok_or(JournalError::NotLoggedIn)
    }

    fn require_admin(&self) -> Result<UserProfile, JournalError> {
        let user = self.require_user()?;
        if !user.role.is_admin() {
            return Err(JournalError::Forbidden {
                message: "admin role required".to_string(),
            });
        }
        Ok(user)
    }

    /// Fetch an entry and check `user` may act on it. Admins may act on any
    /// entry when `admin_allowed` is set.
    async fn authorized_entry(
        &self,
        user: &UserProfile,
        id: &EntryId,
        admin_allowed: bool,
    ) -> Result<JournalEntry, JournalError> {
        let entry = self
            .collection
            .get(id)
            .await?
            .ok_or_else(|| JournalError::NotFound { id: id.to_string() })?;

        if entry.owner_id != user.id && !(admin_allowed && user.role.is_admin()) {
            warn!(user = %user.id, %id, "refusing to touch another user's entry");
            return Err(JournalError::Forbidden {
                message: format!("entry {} belongs to another user", id),
            });
        }
        Ok(entry)
    }

    pub async fn create_entry(&self, draft: EntryDraft) -> Result<EntryId, JournalError> {
        let user = self.require_user()?;
        let mood = draft.validate()?;

        let image_ref = match draft.image {
            Some(image) => Some(upload_image(&*self.blobs, &user.id, image, Utc::now()).await?),
            None => None,
        };

        let record = NewRecord {
            owner_id: user.id.clone(),
            mood: mood.label().to_string(),
            text: draft.text.trim().to_string(),
            image_ref,
        };
        let id = self.collection.create(record).await?;
        info!(user = %user.id, %id, %mood, "entry created");
        Ok(id)
    }

    /// Change mood and/or text. Owner and creation time never change.
    pub async fn update_entry(&self, id: &EntryId, patch: EntryPatch) -> Result<(), JournalError> {
        let user = self.require_user()?;
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }

        let entry = self.authorized_entry(&user, id, false).await?;
        if patch.clears_text() && entry.image_ref.is_none() {
            return Err(ValidationError::EmptyEntry.into());
        }

        let changes = EntryChanges::from(&patch);
        let updated_at = self.collection.update(id, changes.clone()).await?;
        let mirrored = self.feed.apply_patch(id, &changes, updated_at);
        debug!(%id, mirrored, "entry updated");
        Ok(())
    }

    /// Delete an entry. Admins may delete any user's entry.
    pub async fn delete_entry(&self, id: &EntryId) -> Result<(), JournalError> {
        let user = self.require_user()?;
        self.authorized_entry(&user, id, true).await?;

        self.collection.delete(id).await?;
        let removed = self.feed.remove_entry(id);
        info!(user = %user.id, %id, removed, "entry deleted");
        Ok(())
    }

    /// Every user's entries, newest first. Admin only.
    pub async fn list_all_entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        self.require_admin()?;
        let mut entries = self.collection.query_all().await?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Registered users, oldest first. Admin only.
    pub async fn list_users(&self) -> Result<Vec<UserProfile>, JournalError> {
        self.require_admin()?;
        Ok(self.profiles.list_profiles().await?)
    }

    /// Upload a new profile photo for the signed-in user and store its
    /// reference. The session picks up the updated profile.
    pub async fn set_profile_photo(&self, image: ImageUpload) -> Result<UserProfile, JournalError> {
        let user = self.require_user()?;
        let photo_url = upload_image(&*self.blobs, &user.id, image, Utc::now()).await?;
        let updated = self.profiles.set_photo(&user.id, photo_url).await?;
        info!(user = %user.id, "profile photo updated");
        self.session.sign_in(updated.clone());
        Ok(updated)
    }

    /// Mood counts over the entries currently held by the feed
    pub fn mood_stats(&self, filter: TimeFilter, now: DateTime<Utc>) -> MoodCounts {
        compute_mood_counts_for(&self.feed.entries(), filter, now)
    }

    pub fn feed(&self) -> &Arc<FeedStore> {
        &self.feed
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}
