//! Image upload step of entry creation.
//!
//! One upload yields one durable reference. Any failure comes back as
//! `JournalError::UploadFailed` so the caller can abort the create.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::backend::BlobStorage;
use crate::constants::{DEFAULT_IMAGE_CONTENT_TYPE, IMAGE_HASH_PREFIX_LEN, IMAGE_PATH_PREFIX};
use crate::error::{JournalError, ValidationError};
use crate::models::{validate_user_id, ImageUpload, OwnerId};

/// File extension for an image content type
fn extension_for(content_type: &str) -> &'static str {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "jpg",
    }
}

/// Storage path of an image: `images/{owner}/{millis}-{hash}.{ext}`.
///
/// The content hash keeps two uploads in the same millisecond apart. An
/// owner id that is not a single path segment is rejected.
pub fn image_path(
    owner: &OwnerId,
    bytes: &[u8],
    content_type: &str,
    now: DateTime<Utc>,
) -> Result<String, ValidationError> {
    validate_user_id(owner.as_str())?;
    let hash = hex::encode(Sha256::digest(bytes));
    Ok(format!(
        "{}/{}/{}-{}.{}",
        IMAGE_PATH_PREFIX,
        owner,
        now.timestamp_millis(),
        &hash[..IMAGE_HASH_PREFIX_LEN],
        extension_for(content_type)
    ))
}

pub async fn upload_image(
    storage: &dyn BlobStorage,
    owner: &OwnerId,
    image: ImageUpload,
    now: DateTime<Utc>,
) -> Result<String, JournalError> {
    if image.bytes.is_empty() {
        return Err(JournalError::UploadFailed {
            message: "image is empty".to_string(),
        });
    }

    let content_type = if image.content_type.trim().is_empty() {
        DEFAULT_IMAGE_CONTENT_TYPE.to_string()
    } else {
        image.content_type
    };
    let path = image_path(owner, &image.bytes, &content_type, now)?;
    let size = image.bytes.len();

    debug!(%owner, %path, size, "uploading image");
    storage
        .upload(owner, &path, image.bytes, &content_type)
        .await
        .map_err(|e| {
            warn!(%owner, %path, error = %e, "image upload failed");
            JournalError::UploadFailed {
                message: e.to_string(),
            }
        })
}
