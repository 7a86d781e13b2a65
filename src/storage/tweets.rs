use anyhow::Result;

use super::schema::Database;
use super::types::{TweetError, TweetRow};
use crate::cache::{Item, ItemId, UserId};
use crate::mutation::validate_content;

impl Database {
    // ========================================================================
    // Tweet Operations
    // ========================================================================

    /// Publish a tweet stamped with the current time.
    pub async fn create_tweet(&self, author: UserId, content: &str) -> Result<ItemId, TweetError> {
        self.create_tweet_at(author, content, chrono::Utc::now().timestamp())
            .await
    }

    /// Publish a tweet with an explicit creation time (unix seconds).
    ///
    /// Content is trimmed and must pass the same rules as an edit.
    pub async fn create_tweet_at(
        &self,
        author: UserId,
        content: &str,
        created_at: i64,
    ) -> Result<ItemId, TweetError> {
        let content = content.trim();
        validate_content(content, self.max_content_length)?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO tweets (user_id, content, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(author)
        .bind(content)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(tweet_id = id, author, "Tweet created");
        Ok(id)
    }

    /// Load one tweet as `viewer` sees it.
    pub async fn get_tweet(&self, viewer: Option<UserId>, tweet_id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, TweetRow>(
            r#"
            SELECT t.id, t.content, t.created_at,
                   u.id AS author_id, u.name AS author_name, u.image AS author_image,
                   (SELECT COUNT(*) FROM likes l WHERE l.tweet_id = t.id) AS like_count,
                   EXISTS(SELECT 1 FROM likes l WHERE l.tweet_id = t.id AND l.user_id = ?) AS liked_by_me
            FROM tweets t
            JOIN users u ON u.id = t.user_id
            WHERE t.id = ?
        "#,
        )
        .bind(viewer)
        .bind(tweet_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TweetRow::into_item))
    }

    pub async fn author_of(&self, tweet_id: ItemId) -> Result<Option<UserId>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM tweets WHERE id = ?")
            .bind(tweet_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    // ========================================================================
    // Tweet Mutations
    // ========================================================================

    /// Add `viewer`'s like if absent, remove it if present.
    ///
    /// Returns whether the like exists afterwards. Check, delete and insert
    /// run in one transaction so concurrent toggles by the same viewer cannot
    /// both insert.
    pub async fn toggle_like(&self, viewer: UserId, tweet_id: ItemId) -> Result<bool, TweetError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM tweets WHERE id = ?")
            .bind(tweet_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(TweetError::NotFound(tweet_id));
        }

        let removed = sqlx::query("DELETE FROM likes WHERE user_id = ? AND tweet_id = ?")
            .bind(viewer)
            .bind(tweet_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let added = removed == 0;
        if added {
            sqlx::query("INSERT INTO likes (user_id, tweet_id) VALUES (?, ?)")
                .bind(viewer)
                .bind(tweet_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(tweet_id, viewer, added, "Like toggled");
        Ok(added)
    }

    /// Replace a tweet's content, returning it as persisted (trimmed).
    pub async fn edit_tweet(
        &self,
        viewer: UserId,
        tweet_id: ItemId,
        content: &str,
    ) -> Result<String, TweetError> {
        let content = content.trim();
        validate_content(content, self.max_content_length)?;

        let row: Option<(String,)> = sqlx::query_as(
            "UPDATE tweets SET content = ? WHERE id = ? AND user_id = ? RETURNING content",
        )
        .bind(content)
        .bind(tweet_id)
        .bind(viewer)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((persisted,)) => Ok(persisted),
            None => Err(self.refusal(tweet_id).await),
        }
    }

    pub async fn delete_tweet(&self, viewer: UserId, tweet_id: ItemId) -> Result<(), TweetError> {
        let result = sqlx::query("DELETE FROM tweets WHERE id = ? AND user_id = ?")
            .bind(tweet_id)
            .bind(viewer)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.refusal(tweet_id).await);
        }
        tracing::debug!(tweet_id, viewer, "Tweet deleted");
        Ok(())
    }

    /// Explain why an author-scoped write matched no row.
    async fn refusal(&self, tweet_id: ItemId) -> TweetError {
        match sqlx::query_as::<_, (i64,)>("SELECT id FROM tweets WHERE id = ?")
            .bind(tweet_id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(_)) => TweetError::NotAuthor(tweet_id),
            Ok(None) => TweetError::NotFound(tweet_id),
            Err(e) => e.into(),
        }
    }
}
