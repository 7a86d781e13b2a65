use anyhow::{Context, Result};

use super::schema::Database;
use super::types::SeedSummary;

const DEMO_USERS: [(&str, Option<&str>); 4] = [
    ("Ada", Some("https://avatars.example.com/ada.png")),
    ("Grace", Some("https://avatars.example.com/grace.png")),
    ("Linus", None),
    ("Margaret", None),
];

const DEMO_TWEETS: [&str; 12] = [
    "Shipping the new cache layer today",
    "Who else still writes their own linked lists?",
    "Coffee first, then the borrow checker",
    "Pagination by cursor is the only pagination",
    "Reminder: optimistic UI means you need a rollback path",
    "Reading about CRDTs again",
    "Tests green on the first try. Suspicious.",
    "SQLite is the best database nobody talks about",
    "Deleted a thousand lines. Best commit of the week.",
    "Lunch break, back in 30",
    "Feature flags are just if statements with paperwork",
    "Good night, timeline",
];

impl Database {
    /// Populate an empty database with demo users, follows, tweets and likes.
    ///
    /// Does nothing if any user exists. User 1 follows users 2 and 3; tweets
    /// are spaced ten minutes apart, ending now.
    pub async fn seed_demo(&self) -> Result<SeedSummary> {
        if self.user_count().await? > 0 {
            tracing::info!("Database already has users, skipping seed");
            return Ok(SeedSummary::default());
        }

        let mut summary = SeedSummary::default();
        let mut users = Vec::with_capacity(DEMO_USERS.len());
        for (name, image) in DEMO_USERS {
            users.push(self.create_user(name, image).await?);
            summary.users += 1;
        }

        for &followee in &users[1..3] {
            if self.follow(users[0], followee).await? {
                summary.follows += 1;
            }
        }

        let now = chrono::Utc::now().timestamp();
        let oldest = now - 600 * (DEMO_TWEETS.len() as i64 * 2 - 1);
        let mut tweets = Vec::new();
        for round in 0..2 {
            for (i, content) in DEMO_TWEETS.iter().enumerate() {
                let author = users[(i + round) % users.len()];
                let position = (round * DEMO_TWEETS.len() + i) as i64;
                let id = self
                    .create_tweet_at(author, content, oldest + position * 600)
                    .await
                    .with_context(|| format!("Failed to seed tweet {position}"))?;
                tweets.push(id);
            }
        }
        summary.tweets = tweets.len();

        // Every third tweet picks up likes from half of the users.
        for (n, &tweet) in tweets.iter().enumerate().filter(|(n, _)| n % 3 == 0) {
            for (u, &user) in users.iter().enumerate() {
                if (n + u) % 2 == 0 && self.toggle_like(user, tweet).await? {
                    summary.likes += 1;
                }
            }
        }

        tracing::info!(
            users = summary.users,
            follows = summary.follows,
            tweets = summary.tweets,
            likes = summary.likes,
            "Seeded demo data"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::PartitionKey;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_seed_once() {
        let db = Database::open(":memory:").await.unwrap();
        let summary = db.seed_demo().await.unwrap();
        assert_eq!(summary.users, 4);
        assert_eq!(summary.follows, 2);
        assert_eq!(summary.tweets, 24);
        assert!(summary.likes > 0);

        let again = db.seed_demo().await.unwrap();
        assert_eq!(again.tweets, 0);
    }

    #[tokio::test]
    async fn test_seeded_following_feed() {
        let db = Database::open(":memory:").await.unwrap();
        db.seed_demo().await.unwrap();
        let page = db
            .feed_page(Some(1), PartitionKey::FOLLOWING, None, 100)
            .await
            .unwrap();
        assert!(!page.items.is_empty());
        assert!(page.items.iter().all(|i| [2, 3].contains(&i.author.id)));
    }
}
