//! Optimistic mutation dispatch.
//!
//! Every command runs through three phases:
//!
//! 1. **Requested** - validate, snapshot the target item in every affected
//!    partition.
//! 2. **OptimisticApplied** - patch the cache with a best guess so the view
//!    updates before the server answers.
//! 3. **Settled** - fold the authoritative result (or the failure) into the
//!    item's ledger and redraw the item from it: last confirmed state with the
//!    commands still in flight replayed on top. A failed command simply stops
//!    being replayed, so overlapping commands on one item may settle in any
//!    order.
//!
//! Phases 1 and 2 always run on the caller. The remote call either runs inline
//! ([`Dispatcher::dispatch`]) or on a spawned task whose result comes back to
//! the event loop as [`AppEvent::MutationSettled`] ([`Dispatcher::spawn`]), so
//! cache writes never leave the event loop.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::command::{
    Command, CommandKind, MutationError, MutationOutcome, PendingMutation, Phase, Settlement,
};
use super::ledger::ItemLedger;
use super::service::{MutationService, ServiceError};
use super::validate::{validate_content, MAX_CONTENT_LENGTH};
use crate::app::AppEvent;
use crate::cache::{ItemId, Patch, PartitionKey, Patcher, Snapshot, UserId};
use crate::session::Session;
use crate::util::catch_task_panic;

type InFlight = HashMap<(ItemId, CommandKind), usize>;
type Ledgers = HashMap<ItemId, ItemLedger>;

/// Issues like, edit and delete commands and keeps the cache in step.
pub struct Dispatcher<S: MutationService> {
    service: Arc<S>,
    patcher: Patcher,
    session: Session,
    max_content_length: usize,
    in_flight: Arc<Mutex<InFlight>>,
    ledgers: Arc<Mutex<Ledgers>>,
    next_id: Arc<AtomicU64>,
}

impl<S: MutationService> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            patcher: self.patcher.clone(),
            session: self.session.clone(),
            max_content_length: self.max_content_length,
            in_flight: Arc::clone(&self.in_flight),
            ledgers: Arc::clone(&self.ledgers),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<S: MutationService> Dispatcher<S> {
    pub fn new(service: Arc<S>, patcher: Patcher, session: Session) -> Self {
        Self {
            service,
            patcher,
            session,
            max_content_length: MAX_CONTENT_LENGTH,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            ledgers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_max_content_length(mut self, max_content_length: usize) -> Self {
        self.max_content_length = max_content_length;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn patcher(&self) -> &Patcher {
        &self.patcher
    }

    pub fn max_content_length(&self) -> usize {
        self.max_content_length
    }

    /// Whether a `kind` command for `item_id` is waiting on the server.
    pub fn is_pending(&self, item_id: ItemId, kind: CommandKind) -> bool {
        self.in_flight().contains_key(&(item_id, kind))
    }

    /// Number of commands waiting on the server.
    pub fn pending_count(&self) -> usize {
        self.in_flight().values().sum()
    }

    fn in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ledgers(&self) -> MutexGuard<'_, Ledgers> {
        self.ledgers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn viewer(&self) -> Result<UserId, MutationError> {
        self.session
            .viewer_id()
            .ok_or(MutationError::Unauthenticated)
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// Validate `command`, snapshot its item and apply the optimistic patch.
    ///
    /// `author_id` selects the profile partition to fan out to. On error the
    /// cache is untouched and nothing is in flight.
    pub fn begin(
        &self,
        command: Command,
        author_id: UserId,
    ) -> Result<PendingMutation, MutationError> {
        self.viewer()?;
        if let Command::Edit { content, .. } = &command {
            validate_content(content, self.max_content_length)?;
        }

        let item_id = command.item_id();
        let kind = command.kind();
        let keys = PartitionKey::affected_by(author_id);
        let snapshot = self.patcher.snapshot(item_id, &keys);

        let mut pending = PendingMutation {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            command,
            author_id,
            snapshot,
            optimistic: None,
            phase: Phase::Requested,
        };

        // A like on an item no partition holds has nothing to guess from.
        let optimistic = match &pending.command {
            Command::LikeToggle { .. } => pending.snapshot.item().map(|item| Patch::LikeToggled {
                item_id,
                added_like: !item.liked_by_me,
            }),
            Command::Edit { content, .. } => Some(Patch::ContentEdited {
                item_id,
                content: Arc::from(content.as_str()),
            }),
            Command::Delete { .. } => Some(Patch::Removed { item_id }),
        };

        {
            let mut ledgers = self.ledgers();
            let ledger = ledgers.entry(item_id).or_default();
            ledger.observe(&pending.snapshot);
            ledger.push(pending.id, &pending.command);
            if !self.rebase(item_id, &keys, ledger) {
                if let Some(patch) = &optimistic {
                    self.patcher.patch(patch, &keys);
                }
            }
        }
        pending.optimistic = optimistic;
        pending.phase = Phase::OptimisticApplied;
        *self.in_flight().entry((item_id, kind)).or_insert(0) += 1;

        tracing::debug!(
            mutation = pending.id,
            item_id,
            kind = %kind,
            cached_placements = pending.snapshot.placements.len(),
            "Applied optimistic patch"
        );
        Ok(pending)
    }

    /// Reconcile the cache with the result of `pending`'s remote call.
    ///
    /// Must be called exactly once per pending mutation; a second call is
    /// logged and ignored.
    pub fn settle(
        &self,
        pending: &mut PendingMutation,
        result: &Result<MutationOutcome, MutationError>,
    ) {
        if pending.is_settled() {
            tracing::warn!(mutation = pending.id, "Mutation already settled, ignoring");
            return;
        }

        let item_id = pending.item_id();
        let keys = pending.affected_keys();
        let mut ledgers = self.ledgers();
        let ledger = ledgers.entry(item_id).or_default();

        let settlement = match result {
            Ok(outcome) => {
                ledger.confirm(pending.id, outcome);
                if !self.rebase(item_id, &keys, ledger) {
                    self.apply_unseen(pending, outcome);
                }
                tracing::info!(
                    mutation = pending.id,
                    item_id,
                    kind = %pending.kind(),
                    "Mutation confirmed"
                );
                Settlement::Confirmed(outcome.clone())
            }
            Err(e) => {
                tracing::warn!(
                    mutation = pending.id,
                    item_id,
                    kind = %pending.kind(),
                    error = %e,
                    "Mutation failed, rolling back"
                );
                ledger.discard(pending.id);
                self.rebase(item_id, &keys, ledger);
                Settlement::RolledBack
            }
        };
        if ledger.is_idle() {
            ledgers.remove(&item_id);
        }
        drop(ledgers);

        let key = (pending.item_id(), pending.kind());
        let mut in_flight = self.in_flight();
        if let Some(count) = in_flight.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(&key);
            }
        }
        pending.phase = Phase::Settled(settlement);
    }

    /// Rewrite every affected partition to show what `ledger` says the item
    /// looks like now. Returns `false` if the ledger never saw the item.
    fn rebase(&self, item_id: ItemId, keys: &[PartitionKey], ledger: &ItemLedger) -> bool {
        let Some(view) = ledger.view() else {
            return false;
        };

        match view {
            None => {
                self.patcher.patch(&Patch::Removed { item_id }, keys);
            }
            Some(item) => {
                let item = Arc::new(item);
                self.patcher.patch(
                    &Patch::Replaced {
                        item: Arc::clone(&item),
                    },
                    keys,
                );
                // Back into partitions it was optimistically removed from.
                self.patcher.restore(&Snapshot {
                    item_id,
                    placements: ledger.placements_of(&item),
                });
            }
        }
        true
    }

    /// Apply a confirmed outcome to an item no partition held when the
    /// mutation began, in case a page has loaded it since.
    fn apply_unseen(&self, pending: &PendingMutation, outcome: &MutationOutcome) {
        let item_id = pending.item_id();
        let patch = match outcome {
            MutationOutcome::LikeToggled { added_like } => Patch::LikeToggled {
                item_id,
                added_like: *added_like,
            },
            MutationOutcome::Edited { content } => Patch::ContentEdited {
                item_id,
                content: Arc::clone(content),
            },
            MutationOutcome::Deleted => Patch::Removed { item_id },
        };
        self.patcher.patch(&patch, &pending.affected_keys());
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run `command` through all three phases, waiting for the server inline.
    pub async fn dispatch(
        &self,
        command: Command,
        author_id: UserId,
    ) -> Result<MutationOutcome, MutationError> {
        let viewer = self.viewer()?;
        let mut pending = self.begin(command, author_id)?;

        let result = remote_call(&*self.service, viewer, &pending.command)
            .await
            .map_err(MutationError::from);

        self.settle(&mut pending, &result);
        result
    }

    /// Apply the optimistic patch now and run the remote call on a background
    /// task.
    ///
    /// The outcome arrives on `event_tx` as [`AppEvent::MutationSettled`]; the
    /// receiver must pass it to [`Dispatcher::settle`]. Returns the mutation's
    /// sequence number.
    pub fn spawn(
        &self,
        command: Command,
        author_id: UserId,
        event_tx: &mpsc::Sender<AppEvent>,
    ) -> Result<u64, MutationError> {
        let viewer = self.viewer()?;
        let pending = self.begin(command, author_id)?;
        let mutation_id = pending.id;

        let service = Arc::clone(&self.service);
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let result = match catch_task_panic(remote_call(&*service, viewer, &pending.command))
                .await
            {
                Ok(result) => result.map_err(MutationError::from),
                Err(panic_msg) => {
                    tracing::error!(
                        task = "mutation",
                        mutation = pending.id,
                        error = %panic_msg,
                        "Background task panicked"
                    );
                    Err(MutationError::Panicked(panic_msg))
                }
            };

            if let Err(e) = tx.send(AppEvent::MutationSettled { pending, result }).await {
                tracing::warn!(error = %e, event = "MutationSettled", "Channel send failed (receiver dropped)");
            }
        });

        Ok(mutation_id)
    }
}

/// Issue `command` against the remote service and wrap the answer.
async fn remote_call<S: MutationService>(
    service: &S,
    viewer: UserId,
    command: &Command,
) -> Result<MutationOutcome, ServiceError> {
    match command {
        Command::LikeToggle { item_id } => {
            let added_like = service.toggle_like(viewer, *item_id).await?;
            Ok(MutationOutcome::LikeToggled { added_like })
        }
        Command::Edit { item_id, content } => {
            let content = service.edit(viewer, *item_id, content).await?;
            Ok(MutationOutcome::Edited {
                content: Arc::from(content),
            })
        }
        Command::Delete { item_id } => {
            service.delete(viewer, *item_id).await?;
            Ok(MutationOutcome::Deleted)
        }
    }
}
