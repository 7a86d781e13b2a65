use anyhow::Result;

use super::schema::Database;
use crate::cache::UserId;

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    pub async fn create_user(&self, name: &str, image: Option<&str>) -> Result<UserId> {
        let (id,): (i64,) =
            sqlx::query_as("INSERT INTO users (name, image) VALUES (?, ?) RETURNING id")
                .bind(name)
                .bind(image)
                .fetch_one(&self.pool)
                .await?;
        Ok(id)
    }

    pub async fn user_exists(&self, user_id: UserId) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn user_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Make `follower` follow `followee`. Returns `false` if it already did.
    pub async fn follow(&self, follower: UserId, followee: UserId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id) VALUES (?, ?)",
        )
        .bind(follower)
        .bind(followee)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` if `follower` was not following `followee`.
    pub async fn unfollow(&self, follower: UserId, followee: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower)
            .bind(followee)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let ada = db.create_user("Ada", Some("ada.png")).await.unwrap();
        let grace = db.create_user("Grace", None).await.unwrap();

        assert!(db.follow(ada, grace).await.unwrap());
        assert!(!db.follow(ada, grace).await.unwrap());
        assert!(db.unfollow(ada, grace).await.unwrap());
        assert!(!db.unfollow(ada, grace).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_lookup() {
        let db = Database::open(":memory:").await.unwrap();
        assert_eq!(db.user_count().await.unwrap(), 0);
        let ada = db.create_user("Ada", None).await.unwrap();
        assert!(db.user_exists(ada).await.unwrap());
        assert!(!db.user_exists(ada + 1).await.unwrap());
        assert_eq!(db.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_follow_unknown_user_fails() {
        let db = Database::open(":memory:").await.unwrap();
        let ada = db.create_user("Ada", None).await.unwrap();
        // Foreign keys are enforced on every pooled connection.
        assert!(db.follow(ada, 12345).await.is_err());
    }
}
