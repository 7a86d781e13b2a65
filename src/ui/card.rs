//! Per-item controller: like button, action menu and inline editor.
//!
//! A card never writes the cache. It turns user actions into dispatches and
//! re-reads its item from the cache after each settlement.
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::dismissal::{DismissalController, NodeId, PointerListeners};
use super::edit_state::{EditController, EditError, EditState};
use crate::app::AppEvent;
use crate::cache::{Item, Partition};
use crate::mutation::{Command, CommandKind, Dispatcher, MutationError, MutationService};
use crate::session::Session;

/// Entries of the author-only action menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Edit,
    Delete,
}

#[derive(Debug, Error)]
pub enum CardError {
    /// The viewer did not write this item.
    #[error("Only the author can change this item")]
    NotPermitted,

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// UI state of one rendered item.
pub struct ItemCard {
    item: Arc<Item>,
    edit: EditController,
    /// Present only when the viewer may modify the item.
    menu: Option<DismissalController>,
}

impl ItemCard {
    /// Build a card for `item`.
    ///
    /// The action menu is created only for the item's author; `menu_boundary`
    /// is the node wrapping the menu trigger and its entries.
    pub fn new(
        item: Arc<Item>,
        session: &Session,
        listeners: &PointerListeners,
        menu_boundary: NodeId,
        max_content_length: usize,
    ) -> Self {
        let menu = session
            .can_modify(item.author.id)
            .then(|| DismissalController::new(listeners.clone(), menu_boundary));
        Self {
            item,
            edit: EditController::new(max_content_length),
            menu,
        }
    }

    pub fn item(&self) -> &Arc<Item> {
        &self.item
    }

    /// Pick up the latest snapshot of this card's item from `partition`.
    ///
    /// Returns `false` if the item is no longer in the partition (deleted).
    pub fn refresh(&mut self, partition: &Partition) -> bool {
        match partition.find(self.item.id) {
            Some(latest) => {
                if !Arc::ptr_eq(latest, &self.item) {
                    self.item = Arc::clone(latest);
                }
                true
            }
            None => false,
        }
    }

    pub fn edit_state(&self) -> &EditState {
        self.edit.state()
    }

    pub fn has_menu(&self) -> bool {
        self.menu.is_some()
    }

    pub fn is_menu_open(&mut self) -> bool {
        self.menu.as_mut().is_some_and(DismissalController::is_open)
    }

    pub fn toggle_menu(&mut self) -> Result<(), CardError> {
        self.menu
            .as_mut()
            .ok_or(CardError::NotPermitted)?
            .toggle();
        Ok(())
    }

    /// Whether the heart button should show a spinner.
    pub fn is_like_pending<S: MutationService>(&self, dispatcher: &Dispatcher<S>) -> bool {
        dispatcher.is_pending(self.item.id, CommandKind::LikeToggle)
    }

    pub fn toggle_like<S: MutationService>(
        &self,
        dispatcher: &Dispatcher<S>,
        event_tx: &mpsc::Sender<AppEvent>,
    ) -> Result<u64, CardError> {
        let id = dispatcher.spawn(
            Command::LikeToggle {
                item_id: self.item.id,
            },
            self.item.author.id,
            event_tx,
        )?;
        Ok(id)
    }

    /// Run a menu entry. The menu closes either way.
    ///
    /// `Edit` opens the inline editor and returns `None`; `Delete` dispatches
    /// and returns the mutation id.
    pub fn choose<S: MutationService>(
        &mut self,
        action: MenuAction,
        dispatcher: &Dispatcher<S>,
        event_tx: &mpsc::Sender<AppEvent>,
    ) -> Result<Option<u64>, CardError> {
        let menu = self.menu.as_mut().ok_or(CardError::NotPermitted)?;
        menu.close();

        match action {
            MenuAction::Edit => {
                self.edit.open_edit(&self.item.content);
                Ok(None)
            }
            MenuAction::Delete => {
                let id = dispatcher.spawn(
                    Command::Delete {
                        item_id: self.item.id,
                    },
                    self.item.author.id,
                    event_tx,
                )?;
                Ok(Some(id))
            }
        }
    }

    pub fn set_draft(&mut self, text: &str) -> bool {
        self.edit.set_draft(text)
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.edit.cancel()
    }

    /// Close the editor and dispatch the draft.
    ///
    /// The card is back to viewing as soon as this returns; the cache shows
    /// the draft optimistically until the server answers.
    pub fn submit_edit<S: MutationService>(
        &mut self,
        dispatcher: &Dispatcher<S>,
        event_tx: &mpsc::Sender<AppEvent>,
    ) -> Result<u64, CardError> {
        let content = self.edit.submit()?;
        let id = dispatcher.spawn(
            Command::Edit {
                item_id: self.item.id,
                content,
            },
            self.item.author.id,
            event_tx,
        )?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Author, CacheStore, MemoryCacheStore, Page, PartitionKey, Patcher};
    use crate::mutation::fake::FakeService;
    use crate::ui::dismissal::{Document, PointerDown};

    const VIEWER: i64 = 1;
    const OTHER_USER: i64 = 2;
    const MENU_NODE: NodeId = 10;

    fn item(id: i64, author: i64) -> Item {
        Item {
            id,
            content: Arc::from("original"),
            created_at: 1_700_000_000,
            like_count: 2,
            liked_by_me: false,
            author: Author {
                id: author,
                name: None,
                avatar: None,
            },
        }
    }

    struct Fixture {
        store: Arc<MemoryCacheStore>,
        service: Arc<FakeService>,
        dispatcher: Dispatcher<FakeService>,
        listeners: PointerListeners,
        tx: mpsc::Sender<AppEvent>,
        rx: mpsc::Receiver<AppEvent>,
    }

    impl Fixture {
        fn new(items: Vec<Item>) -> Self {
            let store = Arc::new(MemoryCacheStore::default());
            store.write(
                PartitionKey::GLOBAL,
                Partition::new(vec![Page::new(items, None)]),
            );
            let service = Arc::new(FakeService::new());
            let dispatcher = Dispatcher::new(
                Arc::clone(&service),
                Patcher::new(store.clone()),
                Session::authenticated(VIEWER),
            );
            let (tx, rx) = mpsc::channel(8);
            Self {
                store,
                service,
                dispatcher,
                listeners: PointerListeners::new(),
                tx,
                rx,
            }
        }

        fn card(&self, id: i64) -> ItemCard {
            let partition = self.store.read(&PartitionKey::GLOBAL).unwrap();
            let item = Arc::clone(partition.find(id).unwrap());
            ItemCard::new(
                item,
                self.dispatcher.session(),
                &self.listeners,
                MENU_NODE,
                self.dispatcher.max_content_length(),
            )
        }

        async fn settle_next(&mut self) {
            let Some(AppEvent::MutationSettled {
                mut pending,
                result,
            }) = self.rx.recv().await
            else {
                panic!("expected MutationSettled");
            };
            self.dispatcher.settle(&mut pending, &result);
        }

        fn global(&self) -> Partition {
            self.store.read(&PartitionKey::GLOBAL).unwrap()
        }
    }

    #[test]
    fn test_menu_only_for_author() {
        let fx = Fixture::new(vec![item(1, VIEWER), item(2, OTHER_USER)]);
        assert!(fx.card(1).has_menu());

        let mut foreign = fx.card(2);
        assert!(!foreign.has_menu());
        assert!(matches!(foreign.toggle_menu(), Err(CardError::NotPermitted)));
    }

    #[tokio::test]
    async fn test_choose_delete_dispatches_and_closes_menu() {
        let mut fx = Fixture::new(vec![item(1, VIEWER)]);
        let mut card = fx.card(1);

        card.toggle_menu().unwrap();
        assert!(card.is_menu_open());

        let id = card
            .choose(MenuAction::Delete, &fx.dispatcher, &fx.tx)
            .unwrap();
        assert!(id.is_some());
        assert!(!card.is_menu_open());
        assert!(fx.listeners.is_empty());
        assert!(!card.refresh(&fx.global()), "optimistically removed");

        fx.settle_next().await;
        assert!(fx.global().is_empty());
    }

    #[tokio::test]
    async fn test_choose_edit_opens_editor_without_dispatch() {
        let fx = Fixture::new(vec![item(1, VIEWER)]);
        let mut card = fx.card(1);

        let id = card.choose(MenuAction::Edit, &fx.dispatcher, &fx.tx).unwrap();
        assert!(id.is_none());
        assert_eq!(
            card.edit_state(),
            &EditState::Editing {
                draft: "original".to_string()
            }
        );
        assert_eq!(fx.dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_edit_leaves_cache_untouched() {
        let fx = Fixture::new(vec![item(1, VIEWER)]);
        let before = fx.global();
        let mut card = fx.card(1);

        card.choose(MenuAction::Edit, &fx.dispatcher, &fx.tx).unwrap();
        card.set_draft("something else");
        assert!(card.cancel_edit());

        assert_eq!(card.edit_state(), &EditState::Viewing);
        assert_eq!(fx.global(), before);
        assert_eq!(fx.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_edit_views_immediately() {
        let mut fx = Fixture::new(vec![item(1, VIEWER)]);
        let mut card = fx.card(1);

        card.choose(MenuAction::Edit, &fx.dispatcher, &fx.tx).unwrap();
        card.set_draft("  fresh take ");
        card.submit_edit(&fx.dispatcher, &fx.tx).unwrap();

        assert_eq!(card.edit_state(), &EditState::Viewing);
        card.refresh(&fx.global());
        assert_eq!(&*card.item().content, "  fresh take ");

        fx.settle_next().await;
        card.refresh(&fx.global());
        assert_eq!(&*card.item().content, "fresh take");
    }

    #[tokio::test]
    async fn test_like_shows_pending_until_settled() {
        let mut fx = Fixture::new(vec![item(1, OTHER_USER)]);
        let mut card = fx.card(1);

        card.toggle_like(&fx.dispatcher, &fx.tx).unwrap();
        assert!(card.is_like_pending(&fx.dispatcher));

        fx.settle_next().await;
        assert!(!card.is_like_pending(&fx.dispatcher));
        card.refresh(&fx.global());
        assert_eq!(card.item().like_count, 3);
        assert!(card.item().liked_by_me);
    }

    #[tokio::test]
    async fn test_outside_click_closes_menu() {
        let fx = Fixture::new(vec![item(1, VIEWER)]);
        let mut card = fx.card(1);
        let mut doc = Document::new();
        doc.insert_root(0);
        doc.insert(MENU_NODE, 0);
        doc.insert(99, 0);

        card.toggle_menu().unwrap();
        fx.listeners.pointer_down(&doc, &PointerDown::on(99));
        assert!(!card.is_menu_open());
    }

    #[tokio::test]
    async fn test_dropped_card_leaves_no_listener() {
        let fx = Fixture::new(vec![item(1, VIEWER)]);
        let mut card = fx.card(1);
        card.toggle_menu().unwrap();
        assert_eq!(fx.listeners.len(), 1);

        drop(card);
        assert!(fx.listeners.is_empty());
    }
}
