//! Like, edit and delete commands with optimistic cache updates.
//!
//! - [`validate`] - content rules checked before anything is sent
//! - [`service`] - the remote side of a mutation ([`MutationService`])
//! - [`command`] - commands, outcomes and the pending-mutation lifecycle
//! - [`dispatcher`] - runs a command through optimistic apply and settlement
//! - `ledger` - confirmed state and in-flight layers of items being mutated

mod command;
mod dispatcher;
#[cfg(test)]
pub(crate) mod fake;
mod ledger;
mod service;
mod validate;

pub use command::{
    Command, CommandKind, MutationError, MutationOutcome, PendingMutation, Phase, Settlement,
};
pub use dispatcher::Dispatcher;
pub use service::{MutationService, ServiceError};
pub use validate::{clamp_content, validate_content, ValidationError, MAX_CONTENT_LENGTH};
