pub mod entry;
pub mod mood;
pub mod profile;
pub mod time_filter;

pub use entry::{
    EntryChanges, EntryDraft, EntryId, EntryPatch, ImageUpload, JournalEntry, NewRecord, OwnerId,
};
pub use mood::Mood;
pub use profile::{validate_user_id, Role, UserProfile};
pub use time_filter::TimeFilter;
