//! Rewrites cached partitions in response to a mutation.
//!
//! The patcher is the only component that changes items already present in
//! the cache. Every patch fans out over a set of partition keys, reads each
//! partition, rewrites the item sequences of its pages and writes the
//! partition back. Page boundaries and cursors are never touched.
use std::sync::Arc;

use super::store::CacheStore;
use super::types::{Item, ItemId, Page, Partition, PartitionKey};

// ============================================================================
// Patch Types
// ============================================================================

/// A single item-level rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Move the like counter by one and set the viewer's flag to `added_like`.
    LikeToggled { item_id: ItemId, added_like: bool },
    /// Replace the item's content; every other field is kept.
    ContentEdited { item_id: ItemId, content: Arc<str> },
    /// Drop the item from whatever page holds it.
    Removed { item_id: ItemId },
    /// Swap the cached copy for `item` wholesale.
    Replaced { item: Arc<Item> },
}

impl Patch {
    pub fn item_id(&self) -> ItemId {
        match self {
            Patch::LikeToggled { item_id, .. }
            | Patch::ContentEdited { item_id, .. }
            | Patch::Removed { item_id } => *item_id,
            Patch::Replaced { item } => item.id,
        }
    }
}

/// Where an item sat in one partition when a snapshot was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub key: PartitionKey,
    pub page: usize,
    pub position: usize,
    pub item: Arc<Item>,
}

/// Every placement of one item across a set of partitions.
///
/// Taken before an optimistic patch so a failed mutation can be undone.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub item_id: ItemId,
    pub placements: Vec<Placement>,
}

impl Snapshot {
    /// The item as it looked before the patch, if any partition held it.
    pub fn item(&self) -> Option<&Arc<Item>> {
        self.placements.first().map(|p| &p.item)
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Summary of what a patch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Partitions that were rewritten and written back.
    pub partitions_written: usize,
    /// Item slots replaced, removed or reinserted across those partitions.
    pub items_changed: usize,
}

impl PatchReport {
    pub fn is_noop(&self) -> bool {
        self.items_changed == 0
    }
}

// ============================================================================
// Patcher
// ============================================================================

/// Applies [`Patch`]es to every affected partition of a [`CacheStore`].
#[derive(Clone)]
pub struct Patcher {
    store: Arc<dyn CacheStore>,
}

impl Patcher {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Read-only view of a cached partition.
    pub fn read(&self, key: &PartitionKey) -> Option<Partition> {
        self.store.read(key)
    }

    /// Apply `patch` to each partition in `keys`.
    ///
    /// Missing partitions and partitions that do not contain the item are
    /// skipped without a write. Applying the same patch twice applies it twice;
    /// callers patch exactly once per settlement.
    pub fn patch(&self, patch: &Patch, keys: &[PartitionKey]) -> PatchReport {
        let mut report = PatchReport::default();

        for key in keys {
            let Some(mut partition) = self.store.read(key) else {
                tracing::trace!(partition = %key, "Partition not cached, skipping patch");
                continue;
            };

            let changed: usize = partition
                .pages
                .iter_mut()
                .map(|page| apply_to_page(page, patch))
                .sum();

            if changed == 0 {
                tracing::trace!(
                    partition = %key,
                    item_id = patch.item_id(),
                    "Item not present in partition, skipping patch"
                );
                continue;
            }

            self.store.write(*key, partition);
            report.partitions_written += 1;
            report.items_changed += changed;
        }

        tracing::debug!(
            item_id = patch.item_id(),
            partitions = report.partitions_written,
            items = report.items_changed,
            "Applied cache patch"
        );
        report
    }

    /// Record every placement of `item_id` across `keys`.
    pub fn snapshot(&self, item_id: ItemId, keys: &[PartitionKey]) -> Snapshot {
        let mut placements = Vec::new();

        for key in keys {
            let Some(partition) = self.store.read(key) else {
                continue;
            };
            for (page_idx, page) in partition.pages.iter().enumerate() {
                for (position, item) in page.items.iter().enumerate() {
                    if item.id == item_id {
                        placements.push(Placement {
                            key: *key,
                            page: page_idx,
                            position,
                            item: Arc::clone(item),
                        });
                    }
                }
            }
        }

        Snapshot {
            item_id,
            placements,
        }
    }

    /// Put a removed item back where `snapshot` saw it.
    ///
    /// Partitions that already contain the item, were evicted, or no longer
    /// have the recorded page are left alone. Positions past the end of a page
    /// are clamped to the end.
    pub fn restore(&self, snapshot: &Snapshot) -> PatchReport {
        let mut report = PatchReport::default();
        let mut keys: Vec<PartitionKey> = snapshot.placements.iter().map(|p| p.key).collect();
        keys.dedup();

        for key in keys {
            let Some(mut partition) = self.store.read(&key) else {
                continue;
            };
            if partition.contains(snapshot.item_id) {
                continue;
            }

            let mut changed = 0;
            for placement in snapshot.placements.iter().filter(|p| p.key == key) {
                let Some(page) = partition.pages.get_mut(placement.page) else {
                    tracing::debug!(
                        partition = %key,
                        page = placement.page,
                        "Snapshot page no longer cached, cannot restore item"
                    );
                    continue;
                };
                let position = placement.position.min(page.items.len());
                page.items.insert(position, Arc::clone(&placement.item));
                changed += 1;
            }

            if changed > 0 {
                self.store.write(key, partition);
                report.partitions_written += 1;
                report.items_changed += changed;
            }
        }

        report
    }
}

/// Rewrite one page's items; returns how many slots changed.
fn apply_to_page(page: &mut Page, patch: &Patch) -> usize {
    match patch {
        Patch::LikeToggled {
            item_id,
            added_like,
        } => replace_matching(page, *item_id, |item| {
            Some(item.with_like_toggled(*added_like))
        }),
        Patch::ContentEdited { item_id, content } => replace_matching(page, *item_id, |item| {
            (item.content != *content).then(|| item.with_content(Arc::clone(content)))
        }),
        Patch::Replaced { item } => {
            let mut changed = 0;
            for slot in page.items.iter_mut().filter(|slot| slot.id == item.id) {
                if **slot != **item {
                    *slot = Arc::clone(item);
                    changed += 1;
                }
            }
            changed
        }
        Patch::Removed { item_id } => {
            let before = page.items.len();
            page.items.retain(|item| item.id != *item_id);
            before - page.items.len()
        }
    }
}

/// Swap every item with `item_id` for the value `rewrite` returns.
///
/// `rewrite` returning `None` keeps the existing `Arc` so pointer equality
/// survives a patch that would not change anything.
fn replace_matching<F>(page: &mut Page, item_id: ItemId, rewrite: F) -> usize
where
    F: Fn(&Item) -> Option<Item>,
{
    let mut changed = 0;
    for slot in page.items.iter_mut().filter(|item| item.id == item_id) {
        if let Some(next) = rewrite(&**slot) {
            *slot = Arc::new(next);
            changed += 1;
        }
    }
    changed
}
