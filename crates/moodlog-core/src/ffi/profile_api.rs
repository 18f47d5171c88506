use super::*;

use crate::models::ImageUpload;

#[uniffi::export]
impl MoodlogCore {
    /// Replace the signed-in user's profile photo. Returns the updated user.
    pub fn set_profile_photo(
        &self,
        image: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<FfiUser, MoodlogFfiError> {
        let journal = self.journal()?;
        let upload = ImageUpload::new(image, content_type.unwrap_or_default());
        let profile = get_tokio_runtime()?.block_on(journal.set_profile_photo(upload))?;
        Ok(FfiUser::from(&profile))
    }

    /// Every registered user, oldest first. Admin only.
    pub fn list_users(&self) -> Result<Vec<FfiUser>, MoodlogFfiError> {
        let journal = self.journal()?;
        let users = get_tokio_runtime()?.block_on(journal.list_users())?;
        Ok(users.iter().map(FfiUser::from).collect())
    }
}
