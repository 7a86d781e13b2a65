use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::source::FeedSource;
use crate::app::AppEvent;
use crate::cache::{CacheStore, Cursor, Page, PartitionKey, UserId};
use crate::util::catch_task_panic;

/// Items requested per page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Fills cached partitions page by page.
///
/// The loader only ever appends whole pages. Items already in the cache are
/// owned by the patcher and are never rewritten here.
#[derive(Clone)]
pub struct FeedLoader {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn CacheStore>,
    viewer: Option<UserId>,
    page_size: usize,
}

impl FeedLoader {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn CacheStore>,
        viewer: Option<UserId>,
    ) -> Self {
        Self {
            source,
            store,
            viewer,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether `key` can grow. A partition that was never loaded can.
    pub fn has_more(&self, key: &PartitionKey) -> bool {
        self.store.read(key).map_or(true, |p| p.has_more())
    }

    /// Cursor the next fetch for `key` should start after.
    fn resume_cursor(&self, key: &PartitionKey) -> Option<Cursor> {
        self.store.read(key).and_then(|p| p.next_cursor())
    }

    pub async fn fetch_page(&self, key: PartitionKey, after: Option<Cursor>) -> Result<Page> {
        self.source
            .fetch_page(self.viewer, key, after, self.page_size)
            .await
            .with_context(|| format!("Failed to load page of {key}"))
    }

    /// Append `page`, fetched after `after`, to the partition under `key`.
    ///
    /// The page is dropped if the partition moved on since the fetch began
    /// (another load appended first, or the partition was invalidated and
    /// reloaded); appending it then would duplicate or misplace items.
    pub fn append_page(&self, key: PartitionKey, after: Option<Cursor>, page: Page) -> bool {
        let mut partition = self.store.read(&key).unwrap_or_default();

        let expected = match after {
            None => partition.pages.is_empty(),
            Some(cursor) => partition.next_cursor() == Some(cursor),
        };
        if !expected {
            tracing::debug!(
                partition = %key,
                ?after,
                "Discarding stale page, partition changed since fetch"
            );
            return false;
        }

        let items = page.items.len();
        partition.pages.push(page);
        tracing::debug!(
            partition = %key,
            pages = partition.pages.len(),
            items,
            has_more = partition.has_more(),
            "Appended page"
        );
        self.store.write(key, partition);
        true
    }

    /// Fetch and append the next page of `key`.
    ///
    /// Returns `Ok(false)` without fetching when the partition is exhausted.
    pub async fn load_next_page(&self, key: PartitionKey) -> Result<bool> {
        if !self.has_more(&key) {
            return Ok(false);
        }
        let after = self.resume_cursor(&key);
        let page = self.fetch_page(key, after).await?;
        Ok(self.append_page(key, after, page))
    }

    /// Drop the cached partition and load its first page again.
    pub async fn reload(&self, key: PartitionKey) -> Result<bool> {
        self.store.invalidate(&key);
        self.load_next_page(key).await
    }

    /// Fetch the next page of `key` on a background task.
    ///
    /// The page comes back as [`AppEvent::PageLoaded`] and the event loop
    /// appends it with [`FeedLoader::append_page`], keeping every cache write
    /// on the loop. Returns `false` when there is nothing more to load.
    pub fn spawn_next_page(&self, key: PartitionKey, event_tx: &mpsc::Sender<AppEvent>) -> bool {
        if !self.has_more(&key) {
            return false;
        }
        let after = self.resume_cursor(&key);
        let loader = self.clone();
        let tx = event_tx.clone();

        tokio::spawn(async move {
            let result = match catch_task_panic(loader.fetch_page(key, after)).await {
                Ok(result) => result.map_err(|e| format!("{e:#}")),
                Err(panic_msg) => {
                    tracing::error!(task = "page_load", partition = %key, error = %panic_msg, "Background task panicked");
                    Err(panic_msg)
                }
            };

            if let Err(e) = tx.send(AppEvent::PageLoaded { key, after, result }).await {
                tracing::warn!(error = %e, event = "PageLoaded", "Channel send failed (receiver dropped)");
            }
        });
        true
    }
}
