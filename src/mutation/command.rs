use std::sync::Arc;
use thiserror::Error;

use super::service::ServiceError;
use super::validate::ValidationError;
use crate::cache::{ItemId, Patch, PartitionKey, Snapshot, UserId};

// ============================================================================
// Commands and Outcomes
// ============================================================================

/// The three mutations a viewer can issue against an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    LikeToggle,
    Edit,
    Delete,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::LikeToggle => "like_toggle",
            CommandKind::Edit => "edit",
            CommandKind::Delete => "delete",
        }
    }

    /// Human-readable verb for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::LikeToggle => "toggle like",
            CommandKind::Edit => "edit",
            CommandKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation request for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LikeToggle { item_id: ItemId },
    Edit { item_id: ItemId, content: String },
    Delete { item_id: ItemId },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::LikeToggle { .. } => CommandKind::LikeToggle,
            Command::Edit { .. } => CommandKind::Edit,
            Command::Delete { .. } => CommandKind::Delete,
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            Command::LikeToggle { item_id }
            | Command::Edit { item_id, .. }
            | Command::Delete { item_id } => *item_id,
        }
    }
}

/// Authoritative result of a settled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// `true` if the like was added, `false` if it was removed.
    LikeToggled { added_like: bool },
    /// Content as the server persisted it.
    Edited { content: Arc<str> },
    Deleted,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum MutationError {
    /// Refused before dispatch; nothing was sent and the cache is untouched.
    #[error("Invalid content: {0}")]
    Validation(#[from] ValidationError),

    /// No signed-in viewer to act as.
    #[error("Sign in to modify items")]
    Unauthenticated,

    /// The remote call failed; the optimistic patch was rolled back.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The background task running the remote call panicked.
    #[error("Mutation task panicked: {0}")]
    Panicked(String),
}

// ============================================================================
// Mutation Lifecycle
// ============================================================================

/// How a pending mutation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The server accepted the command; the cache shows its result.
    Confirmed(MutationOutcome),
    /// The command failed; the optimistic patch was undone.
    RolledBack,
}

/// Where a mutation is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Accepted by the dispatcher, cache not yet touched.
    Requested,
    /// The optimistic patch is visible in the cache.
    OptimisticApplied,
    Settled(Settlement),
}

/// One in-flight command and everything needed to settle it.
///
/// Created by the dispatcher, carried through the remote call (possibly on
/// another task) and handed back to the dispatcher on settlement.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    /// Dispatcher-assigned sequence number, for log correlation.
    pub id: u64,
    pub command: Command,
    pub author_id: UserId,
    /// The item as it looked in every affected partition before the
    /// optimistic patch.
    pub snapshot: Snapshot,
    /// What was applied optimistically, if anything.
    pub optimistic: Option<Patch>,
    pub phase: Phase,
}

impl PendingMutation {
    pub fn kind(&self) -> CommandKind {
        self.command.kind()
    }

    pub fn item_id(&self) -> ItemId {
        self.command.item_id()
    }

    /// Partitions this mutation fans out to.
    pub fn affected_keys(&self) -> [PartitionKey; 3] {
        PartitionKey::affected_by(self.author_id)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, Phase::Settled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_accessors() {
        let cmd = Command::Edit {
            item_id: 4,
            content: "x".to_string(),
        };
        assert_eq!(cmd.kind(), CommandKind::Edit);
        assert_eq!(cmd.item_id(), 4);
        assert_eq!(Command::Delete { item_id: 9 }.kind().to_string(), "delete");
    }

    #[test]
    fn test_service_error_is_transparent() {
        let err = MutationError::from(ServiceError::NotFound(3));
        assert_eq!(err.to_string(), "Item 3 not found");
    }

    #[test]
    fn test_validation_error_message() {
        let err = MutationError::from(ValidationError::Empty);
        assert!(err.to_string().contains("cannot be empty"));
    }
}
