pub mod feed_store;
pub mod merge;

pub use feed_store::{FeedSnapshot, FeedStore};
pub use merge::LiveCoverage;
