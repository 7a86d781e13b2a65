use anyhow::Result;
use async_trait::async_trait;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::TweetRow;
use crate::cache::{Cursor, Item, Page, PartitionKey, UserId};
use crate::feed::FeedSource;

/// Largest page a single query may return (OOM protection)
const MAX_PAGE_SIZE: usize = 100;

impl Database {
    // ========================================================================
    // Feed Queries
    // ========================================================================

    /// One page of the feed identified by `key`, newest first.
    ///
    /// Pages walk `(created_at, id)` descending and `after` is exclusive.
    /// One extra row is fetched to learn whether another page exists; the
    /// returned cursor is the last item of this page, or `None` at the end.
    ///
    /// The following-only feed of an anonymous viewer is always empty.
    pub async fn feed_page(
        &self,
        viewer: Option<UserId>,
        key: PartitionKey,
        after: Option<Cursor>,
        limit: usize,
    ) -> Result<Page> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            r#"
            SELECT t.id, t.content, t.created_at,
                   u.id AS author_id, u.name AS author_name, u.image AS author_image,
                   (SELECT COUNT(*) FROM likes l WHERE l.tweet_id = t.id) AS like_count,
                   EXISTS(SELECT 1 FROM likes l WHERE l.tweet_id = t.id AND l.user_id = "#,
        );
        query.push_bind(viewer);
        query.push(
            r#") AS liked_by_me
            FROM tweets t
            JOIN users u ON u.id = t.user_id
            WHERE 1 = 1"#,
        );

        match key {
            PartitionKey::Feed {
                only_following: false,
            } => {}
            PartitionKey::Feed {
                only_following: true,
            } => {
                let Some(viewer) = viewer else {
                    return Ok(Page::new(Vec::new(), None));
                };
                query.push(
                    " AND t.user_id IN (SELECT followee_id FROM follows WHERE follower_id = ",
                );
                query.push_bind(viewer);
                query.push(")");
            }
            PartitionKey::Profile { user_id } => {
                query.push(" AND t.user_id = ");
                query.push_bind(user_id);
            }
        }

        if let Some(cursor) = after {
            query.push(" AND (t.created_at < ");
            query.push_bind(cursor.created_at);
            query.push(" OR (t.created_at = ");
            query.push_bind(cursor.created_at);
            query.push(" AND t.id < ");
            query.push_bind(cursor.id);
            query.push("))");
        }

        query.push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ");
        query.push_bind((limit + 1) as i64);

        let rows: Vec<TweetRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut items: Vec<Item> = rows.into_iter().map(TweetRow::into_item).collect();
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|item| Cursor {
                created_at: item.created_at,
                id: item.id,
            })
        } else {
            None
        };

        tracing::debug!(
            partition = %key,
            items = items.len(),
            has_more = next_cursor.is_some(),
            "Loaded feed page"
        );
        Ok(Page::new(items, next_cursor))
    }
}

#[async_trait]
impl FeedSource for Database {
    async fn fetch_page(
        &self,
        viewer: Option<UserId>,
        key: PartitionKey,
        after: Option<Cursor>,
        limit: usize,
    ) -> Result<Page> {
        self.feed_page(viewer, key, after, limit).await
    }
}
