use std::sync::Arc;
use thiserror::Error;

use crate::cache::{Author, Item, ItemId};
use crate::mutation::ValidationError;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has locked the database
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, singling out lock contention.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if Self::is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }

    /// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) messages.
    pub(crate) fn is_lock_message(message: &str) -> bool {
        let message = message.to_lowercase();
        message.contains("database is locked")
            || message.contains("database table is locked")
            || message.contains("sqlite_busy")
            || message.contains("sqlite_locked")
            || message.contains("unable to open database file")
    }
}

/// Why a tweet write was refused.
#[derive(Debug, Error)]
pub enum TweetError {
    #[error("Tweet {0} does not exist")]
    NotFound(ItemId),

    #[error("Only the author may modify tweet {0}")]
    NotAuthor(ItemId),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for TweetError {
    fn from(err: sqlx::Error) -> Self {
        TweetError::Database(DatabaseError::from_sqlx(err))
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// One tweet joined with its author and the viewer's like state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TweetRow {
    pub id: i64,
    pub content: String,
    pub created_at: i64,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub like_count: i64,
    pub liked_by_me: bool,
}

impl TweetRow {
    pub fn into_item(self) -> Item {
        Item {
            id: self.id,
            content: Arc::from(self.content),
            created_at: self.created_at,
            like_count: self.like_count,
            liked_by_me: self.liked_by_me,
            author: Author {
                id: self.author_id,
                name: self.author_name.map(Arc::from),
                avatar: self.author_image.map(Arc::from),
            },
        }
    }
}

/// What `seed_demo` created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SeedSummary {
    pub users: usize,
    pub follows: usize,
    pub tweets: usize,
    pub likes: usize,
}
