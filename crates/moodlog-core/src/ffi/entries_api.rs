use super::*;

use chrono::Utc;

use crate::models::{EntryDraft, EntryId, EntryPatch, ImageUpload};

#[uniffi::export]
impl MoodlogCore {
    // =========================================================================
    // WRITE PATH
    // =========================================================================

    /// Create an entry, uploading the image first when one is given.
    /// Returns the new entry id.
    pub fn create_entry(
        &self,
        mood: FfiMood,
        text: String,
        image: Option<Vec<u8>>,
        image_content_type: Option<String>,
    ) -> Result<String, MoodlogFfiError> {
        let journal = self.journal()?;
        let mut draft = EntryDraft::new(mood.into()).text(text);
        if let Some(bytes) = image {
            draft = draft.image(ImageUpload::new(bytes, image_content_type.unwrap_or_default()));
        }
        let id = get_tokio_runtime()?.block_on(journal.create_entry(draft))?;
        Ok(id.to_string())
    }

    pub fn update_entry(
        &self,
        id: String,
        mood: Option<FfiMood>,
        text: Option<String>,
    ) -> Result<(), MoodlogFfiError> {
        let journal = self.journal()?;
        let patch = EntryPatch {
            mood: mood.map(Into::into),
            text,
        };
        get_tokio_runtime()?.block_on(journal.update_entry(&EntryId::new(id), patch))?;
        Ok(())
    }

    pub fn delete_entry(&self, id: String) -> Result<(), MoodlogFfiError> {
        let journal = self.journal()?;
        get_tokio_runtime()?.block_on(journal.delete_entry(&EntryId::new(id)))?;
        Ok(())
    }

    // =========================================================================
    // FEED
    // =========================================================================

    /// Current feed state
    pub fn feed(&self) -> Result<FeedView, MoodlogFfiError> {
        let feed = self.feed_store()?;
        Ok(FeedView::from(&feed.snapshot()))
    }

    /// Fetch the next page (call when the list nears its end).
    pub fn load_more(&self) -> Result<FeedView, MoodlogFfiError> {
        let feed = self.feed_store()?;
        get_tokio_runtime()?.block_on(feed.load_more());
        Ok(FeedView::from(&feed.snapshot()))
    }

    /// Pull-to-refresh
    pub fn refresh(&self) -> Result<FeedView, MoodlogFfiError> {
        let feed = self.feed_store()?;
        get_tokio_runtime()?.block_on(feed.refresh());
        Ok(FeedView::from(&feed.snapshot()))
    }

    // =========================================================================
    // STATS & ADMIN
    // =========================================================================

    pub fn mood_stats(&self, window: FfiTimeFilter) -> Result<MoodCountsView, MoodlogFfiError> {
        let journal = self.journal()?;
        Ok(journal.mood_stats(window.into(), Utc::now()).into())
    }

    /// Every user's entries. Admin only.
    pub fn list_all_entries(&self) -> Result<Vec<FfiEntry>, MoodlogFfiError> {
        let journal = self.journal()?;
        let entries = get_tokio_runtime()?.block_on(journal.list_all_entries())?;
        Ok(entries.iter().map(FfiEntry::from).collect())
    }
}
