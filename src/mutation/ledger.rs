//! Per-item bookkeeping for overlapping mutations.
//!
//! While any mutation of an item is in flight the dispatcher keeps an
//! [`ItemLedger`] for it: the last server-confirmed state of the item plus the
//! optimistic layer of every command still waiting on the server. After each
//! settlement the cached view is recomputed from the confirmed state with the
//! surviving layers replayed on top, so settlements may arrive in any order
//! without one mutation's rollback clobbering another's result.
use std::collections::BTreeMap;
use std::sync::Arc;

use super::command::{Command, MutationOutcome};
use crate::cache::{Item, Placement, Snapshot};

/// The optimistic effect of one in-flight command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Layer {
    /// Flip whatever the like flag shows at that point.
    Like,
    Edit(Arc<str>),
    Delete,
}

impl Layer {
    fn of(command: &Command) -> Self {
        match command {
            Command::LikeToggle { .. } => Layer::Like,
            Command::Edit { content, .. } => Layer::Edit(Arc::from(content.as_str())),
            Command::Delete { .. } => Layer::Delete,
        }
    }
}

/// Server-confirmed state of an item.
#[derive(Debug, Clone)]
struct Confirmed {
    /// `like_count` is kept unfloored so confirmations commute; it is floored
    /// at zero when rendered.
    item: Item,
    removed: bool,
    /// Mutation that last set `liked_by_me` (0 = the cached original).
    liked_from: u64,
    /// Mutation that last set `content`.
    content_from: u64,
    /// Where the item sat when it was first snapshotted.
    placements: Vec<Placement>,
}

#[derive(Debug, Default)]
pub(crate) struct ItemLedger {
    /// `None` while no partition has shown the item.
    confirmed: Option<Confirmed>,
    pending: BTreeMap<u64, Layer>,
}

impl ItemLedger {
    /// Adopt `snapshot` as the confirmed state if none is known yet.
    ///
    /// Only the first snapshot that finds the item counts: later snapshots
    /// already show optimistic layers.
    pub(crate) fn observe(&mut self, snapshot: &Snapshot) {
        if self.confirmed.is_some() {
            return;
        }
        if let Some(item) = snapshot.item() {
            self.confirmed = Some(Confirmed {
                item: (**item).clone(),
                removed: false,
                liked_from: 0,
                content_from: 0,
                placements: snapshot.placements.clone(),
            });
        }
    }

    pub(crate) fn push(&mut self, mutation: u64, command: &Command) {
        self.pending.insert(mutation, Layer::of(command));
    }

    /// Fold a confirmed outcome into the confirmed state and drop its layer.
    ///
    /// Like deltas always count. The like flag and the content come from the
    /// most recently issued confirmed command, whatever order the
    /// confirmations arrive in.
    pub(crate) fn confirm(&mut self, mutation: u64, outcome: &MutationOutcome) {
        self.pending.remove(&mutation);
        let Some(confirmed) = &mut self.confirmed else {
            return;
        };

        match outcome {
            MutationOutcome::LikeToggled { added_like } => {
                confirmed.item.like_count += if *added_like { 1 } else { -1 };
                if mutation > confirmed.liked_from {
                    confirmed.item.liked_by_me = *added_like;
                    confirmed.liked_from = mutation;
                }
            }
            MutationOutcome::Edited { content } => {
                if mutation > confirmed.content_from {
                    confirmed.item.content = Arc::clone(content);
                    confirmed.content_from = mutation;
                }
            }
            MutationOutcome::Deleted => confirmed.removed = true,
        }
    }

    /// Drop a failed command's layer.
    pub(crate) fn discard(&mut self, mutation: u64) {
        self.pending.remove(&mutation);
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// What the cache should show, or `None` if the item was never seen.
    ///
    /// The inner `None` means the item is (or is about to be) deleted.
    pub(crate) fn view(&self) -> Option<Option<Item>> {
        let confirmed = self.confirmed.as_ref()?;
        if confirmed.removed || self.pending.values().any(|l| *l == Layer::Delete) {
            return Some(None);
        }

        let mut item = confirmed.item.clone();
        for (mutation, layer) in &self.pending {
            match layer {
                Layer::Like if *mutation > confirmed.liked_from => {
                    item.like_count += if item.liked_by_me { -1 } else { 1 };
                    item.liked_by_me = !item.liked_by_me;
                }
                Layer::Edit(content) if *mutation > confirmed.content_from => {
                    item.content = Arc::clone(content);
                }
                _ => {}
            }
        }
        item.like_count = item.like_count.max(0);
        Some(Some(item))
    }

    /// Recorded placements carrying `item`, for reinserting a removed item.
    pub(crate) fn placements_of(&self, item: &Arc<Item>) -> Vec<Placement> {
        self.confirmed
            .as_ref()
            .map(|c| {
                c.placements
                    .iter()
                    .map(|p| Placement {
                        item: Arc::clone(item),
                        ..p.clone()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Author, PartitionKey};
    use pretty_assertions::assert_eq;

    fn item(likes: i64, liked: bool) -> Item {
        Item {
            id: 7,
            content: Arc::from("original"),
            created_at: 1_700_000_000,
            like_count: likes,
            liked_by_me: liked,
            author: Author {
                id: 3,
                name: None,
                avatar: None,
            },
        }
    }

    fn ledger(likes: i64, liked: bool) -> ItemLedger {
        let mut ledger = ItemLedger::default();
        ledger.observe(&Snapshot {
            item_id: 7,
            placements: vec![Placement {
                key: PartitionKey::GLOBAL,
                page: 0,
                position: 1,
                item: Arc::new(item(likes, liked)),
            }],
        });
        ledger
    }

    fn edit(content: &str) -> Command {
        Command::Edit {
            item_id: 7,
            content: content.to_string(),
        }
    }

    const LIKE: Command = Command::LikeToggle { item_id: 7 };

    #[test]
    fn test_unseen_item_has_no_view() {
        let mut ledger = ItemLedger::default();
        ledger.push(1, &LIKE);
        assert_eq!(ledger.view(), None);
        ledger.observe(&Snapshot {
            item_id: 7,
            placements: Vec::new(),
        });
        assert_eq!(ledger.view(), None);
    }

    #[test]
    fn test_layers_replay_over_confirmed_state() {
        let mut ledger = ledger(2, false);
        ledger.push(1, &LIKE);
        ledger.push(2, &edit("draft"));

        let shown = ledger.view().unwrap().unwrap();
        assert_eq!(shown.like_count, 3);
        assert!(shown.liked_by_me);
        assert_eq!(&*shown.content, "draft");

        ledger.discard(1);
        ledger.discard(2);
        assert_eq!(ledger.view(), Some(Some(item(2, false))));
        assert!(ledger.is_idle());
    }

    #[test]
    fn test_later_confirmed_edit_survives_earlier_failure() {
        let mut ledger = ledger(0, false);
        ledger.push(1, &edit("A"));
        ledger.push(2, &edit("B"));

        ledger.confirm(
            2,
            &MutationOutcome::Edited {
                content: Arc::from("B"),
            },
        );
        ledger.discard(1);
        assert_eq!(&*ledger.view().unwrap().unwrap().content, "B");
    }

    #[test]
    fn test_stale_edit_confirmation_does_not_win() {
        let mut ledger = ledger(0, false);
        ledger.push(1, &edit("A"));
        ledger.push(2, &edit("B"));

        ledger.confirm(
            2,
            &MutationOutcome::Edited {
                content: Arc::from("B"),
            },
        );
        ledger.confirm(
            1,
            &MutationOutcome::Edited {
                content: Arc::from("A"),
            },
        );
        assert_eq!(&*ledger.view().unwrap().unwrap().content, "B");
    }

    #[test]
    fn test_pending_delete_hides_item_until_it_fails() {
        let mut ledger = ledger(2, false);
        ledger.push(1, &LIKE);
        ledger.push(2, &Command::Delete { item_id: 7 });
        assert_eq!(ledger.view(), Some(None));

        ledger.discard(1);
        ledger.discard(2);
        assert_eq!(ledger.view(), Some(Some(item(2, false))));
    }

    #[test]
    fn test_confirmed_delete_is_final() {
        let mut ledger = ledger(2, false);
        ledger.push(1, &Command::Delete { item_id: 7 });
        ledger.push(2, &edit("late"));
        ledger.confirm(1, &MutationOutcome::Deleted);
        ledger.discard(2);
        assert_eq!(ledger.view(), Some(None));
    }

    #[test]
    fn test_like_at_zero_rolls_back_symmetrically() {
        let mut ledger = ledger(0, true);
        ledger.push(1, &LIKE);
        let shown = ledger.view().unwrap().unwrap();
        assert_eq!((shown.like_count, shown.liked_by_me), (0, false));

        ledger.discard(1);
        assert_eq!(ledger.view(), Some(Some(item(0, true))));
    }

    #[test]
    fn test_like_confirmations_commute() {
        let mut ledger = ledger(5, false);
        ledger.push(1, &LIKE);
        ledger.push(2, &LIKE);

        ledger.confirm(2, &MutationOutcome::LikeToggled { added_like: false });
        ledger.confirm(1, &MutationOutcome::LikeToggled { added_like: true });
        assert_eq!(ledger.view(), Some(Some(item(5, false))));
    }

    #[test]
    fn test_placements_carry_new_item() {
        let ledger = ledger(1, false);
        let fresh = Arc::new(item(9, true));
        let placements = ledger.placements_of(&fresh);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].position, 1);
        assert!(Arc::ptr_eq(&placements[0].item, &fresh));
    }
}
