//! Application-wide constants
//!
//! Defaults and names shared by the core, the CLI and the FFI layer.

/// Entries requested per backfill page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Newest entries covered by the live subscription
pub const DEFAULT_LIVE_WINDOW: usize = 50;

/// Default data directory name under the platform data dir
pub const DATA_DIR_NAME: &str = "moodlog";

/// Environment variable overriding the base data directory
pub const BASE_DIR_ENV: &str = "MOODLOG_BASE_DIR";

/// Environment variable enabling file logging
pub const LOG_FILE_ENV: &str = "MOODLOG_LOG_FILE";

/// File the local backend persists entries to
pub const ENTRIES_FILE: &str = "entries.json";

/// File the local backend persists the user directory to
pub const USERS_FILE: &str = "users.json";

/// Directory the local backend stores blobs in
pub const BLOBS_DIR: &str = "blobs";

/// Prefix of every uploaded image path
pub const IMAGE_PATH_PREFIX: &str = "images";

/// Hex characters of the content hash kept in image paths
pub const IMAGE_HASH_PREFIX_LEN: usize = 12;

/// Content type assumed when the picker reports none
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";
