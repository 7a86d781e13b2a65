use async_trait::async_trait;

use super::schema::Database;
use super::types::{DatabaseError, TweetError};
use crate::cache::{ItemId, UserId};
use crate::mutation::{MutationService, ServiceError};

impl From<TweetError> for ServiceError {
    fn from(err: TweetError) -> Self {
        match err {
            TweetError::NotFound(id) => ServiceError::NotFound(id),
            TweetError::NotAuthor(id) => ServiceError::Forbidden(id),
            TweetError::Invalid(e) => ServiceError::Rejected(e.to_string()),
            TweetError::Database(DatabaseError::InstanceLocked) => {
                ServiceError::Transport(DatabaseError::InstanceLocked.to_string())
            }
            TweetError::Database(e) => ServiceError::Storage(e.into()),
        }
    }
}

/// The database is the authoritative side of every mutation.
#[async_trait]
impl MutationService for Database {
    async fn toggle_like(&self, viewer: UserId, item_id: ItemId) -> Result<bool, ServiceError> {
        Ok(Database::toggle_like(self, viewer, item_id).await?)
    }

    async fn edit(
        &self,
        viewer: UserId,
        item_id: ItemId,
        content: &str,
    ) -> Result<String, ServiceError> {
        Ok(self.edit_tweet(viewer, item_id, content).await?)
    }

    async fn delete(&self, viewer: UserId, item_id: ItemId) -> Result<(), ServiceError> {
        Ok(self.delete_tweet(viewer, item_id).await?)
    }
}
