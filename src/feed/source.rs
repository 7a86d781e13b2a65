use anyhow::Result;
use async_trait::async_trait;

use crate::cache::{Cursor, Page, PartitionKey, UserId};

/// Authoritative source of feed pages.
///
/// `after` is the cursor of the last loaded page, or `None` for the first
/// page. The returned page's `next_cursor` is `None` once the feed is
/// exhausted.
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    async fn fetch_page(
        &self,
        viewer: Option<UserId>,
        key: PartitionKey,
        after: Option<Cursor>,
        limit: usize,
    ) -> Result<Page>;
}
