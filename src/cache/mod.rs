//! Cached feed partitions and the patcher that keeps them in sync.
//!
//! - [`types`] - items, pages, partitions and partition keys
//! - [`store`] - the [`CacheStore`] trait and an LRU-bounded memory store
//! - [`patcher`] - fan-out rewrites of every partition holding an item

mod patcher;
mod store;
mod types;

pub use patcher::{Patch, PatchReport, Patcher, Placement, Snapshot};
pub use store::{CacheStore, MemoryCacheStore, DEFAULT_PARTITION_CAPACITY};
pub use types::{Author, Cursor, Item, ItemId, Page, Partition, PartitionKey, UserId};
