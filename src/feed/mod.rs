//! Feed loading: cursor-based infinite scroll into the partition cache.
//!
//! - [`FeedSource`] - the authoritative page provider (implemented by
//!   [`crate::storage::Database`])
//! - [`FeedLoader`] - appends fetched pages to cached partitions

mod loader;
mod source;

pub use loader::{FeedLoader, DEFAULT_PAGE_SIZE};
pub use source::FeedSource;
