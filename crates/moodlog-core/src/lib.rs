// UniFFI scaffolding for generating Swift/Kotlin bindings
uniffi::setup_scaffolding!();

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod ffi;
pub mod journal;
pub mod models;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod store;
pub mod tracing_setup;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{BlobStorage, Cursor, EntryCollection, MemoryBackend, Page, ProfileDirectory};
pub use config::CoreConfig;
pub use error::{BackendError, FeedError, JournalError, ValidationError};
pub use ffi::{FeedView, MoodlogCore, MoodlogFfiError};
pub use journal::JournalService;
pub use runtime::CoreRuntime;
pub use session::Session;
pub use store::{FeedSnapshot, FeedStore};
