use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identity of a feed item, shared by every partition that holds it.
pub type ItemId = i64;

/// Identity of a user (author or viewer).
pub type UserId = i64;

// ============================================================================
// Item
// ============================================================================

/// Author reference embedded in every item.
///
/// `name` and `avatar` use `Arc<str>` so cloning an item snapshot never copies
/// string data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: UserId,
    pub name: Option<Arc<str>>,
    pub avatar: Option<Arc<str>>,
}

/// One feed entry as the viewer sees it.
///
/// Items are immutable snapshots. The cache holds them behind `Arc` and a patch
/// swaps the whole `Arc` for a new one, so unchanged items stay pointer-equal
/// across patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub content: Arc<str>,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    pub like_count: i64,
    pub liked_by_me: bool,
    pub author: Author,
}

impl Item {
    /// Copy with the like counter moved by one and the flag set to `added_like`.
    ///
    /// The counter is floored at zero.
    pub fn with_like_toggled(&self, added_like: bool) -> Item {
        let like_count = if added_like {
            self.like_count + 1
        } else {
            (self.like_count - 1).max(0)
        };
        Item {
            like_count,
            liked_by_me: added_like,
            ..self.clone()
        }
    }

    /// Copy with only the content replaced.
    pub fn with_content(&self, content: Arc<str>) -> Item {
        Item {
            content,
            ..self.clone()
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Continuation cursor for the next page: the `(created_at, id)` of the last
/// item on the current page. Opaque to everything except the feed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub created_at: i64,
    pub id: ItemId,
}

/// One loaded page of a partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<Arc<Item>>,
    /// `None` on the last page.
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn new(items: Vec<Item>, next_cursor: Option<Cursor>) -> Self {
        Self {
            items: items.into_iter().map(Arc::new).collect(),
            next_cursor,
        }
    }
}

/// An ordered sequence of pages cached under one [`PartitionKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    pub pages: Vec<Page>,
}

impl Partition {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Whether another page can be fetched after the last loaded one.
    ///
    /// An empty partition has not loaded anything yet, so more is assumed.
    pub fn has_more(&self) -> bool {
        match self.pages.last() {
            Some(page) => page.next_cursor.is_some(),
            None => true,
        }
    }

    /// Cursor to resume from, if the partition has a next page.
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.pages.last().and_then(|p| p.next_cursor)
    }

    /// All items in page order, flattened.
    pub fn items(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }

    pub fn find(&self, item_id: ItemId) -> Option<&Arc<Item>> {
        self.items().find(|item| item.id == item_id)
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.find(item_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Partition Keys
// ============================================================================

/// The query parameters that produced a cached partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartitionKey {
    /// The home feed; `only_following` restricts it to followed authors.
    Feed { only_following: bool },
    /// Every item written by one user.
    Profile { user_id: UserId },
}

impl PartitionKey {
    pub const GLOBAL: PartitionKey = PartitionKey::Feed {
        only_following: false,
    };
    pub const FOLLOWING: PartitionKey = PartitionKey::Feed {
        only_following: true,
    };

    pub fn profile(user_id: UserId) -> Self {
        PartitionKey::Profile { user_id }
    }

    /// Partitions that may hold an item written by `author_id`.
    ///
    /// Like, edit and delete all fan out to the same three keys.
    pub fn affected_by(author_id: UserId) -> [PartitionKey; 3] {
        [
            PartitionKey::GLOBAL,
            PartitionKey::FOLLOWING,
            PartitionKey::profile(author_id),
        ]
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionKey::Feed {
                only_following: false,
            } => write!(f, "feed"),
            PartitionKey::Feed {
                only_following: true,
            } => write!(f, "feed:following"),
            PartitionKey::Profile { user_id } => write!(f, "profile:{user_id}"),
        }
    }
}
