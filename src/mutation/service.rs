use async_trait::async_trait;
use thiserror::Error;

use crate::cache::{ItemId, UserId};

/// Failures reported by the remote side of a mutation.
///
/// Any of these means the mutation did not settle successfully; the
/// dispatcher rolls back its optimistic patch.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The target item does not exist (never did, or already deleted).
    #[error("Item {0} not found")]
    NotFound(ItemId),

    /// The viewer may not modify this item.
    #[error("Not allowed to modify item {0}")]
    Forbidden(ItemId),

    /// The server refused the payload.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// The request could not be delivered or answered.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// The authoritative side of like, edit and delete.
///
/// Results may arrive in any order relative to the order of requests. The
/// returned values are authoritative: `toggle_like` reports whether the like
/// now exists, `edit` returns the content as persisted.
#[async_trait]
pub trait MutationService: Send + Sync + 'static {
    /// Add the viewer's like if absent, remove it if present.
    async fn toggle_like(&self, viewer: UserId, item_id: ItemId) -> Result<bool, ServiceError>;

    /// Replace the item's content; returns the persisted content.
    async fn edit(
        &self,
        viewer: UserId,
        item_id: ItemId,
        content: &str,
    ) -> Result<String, ServiceError>;

    /// Remove the item.
    async fn delete(&self, viewer: UserId, item_id: ItemId) -> Result<(), ServiceError>;
}
