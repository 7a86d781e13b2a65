//! Card-level flows through the event loop against the SQLite backend.

use std::sync::Arc;

use flock::app::App;
use flock::cache::{CacheStore, MemoryCacheStore, PartitionKey, Patcher};
use flock::feed::FeedLoader;
use flock::mutation::Dispatcher;
use flock::session::Session;
use flock::storage::Database;
use flock::ui::{
    run_until_idle, CardError, Document, EditState, Exit, ItemCard, MenuAction, PointerDown,
    PointerListeners,
};
use tokio::sync::mpsc;

const MENU: u64 = 2;

async fn setup(viewer: i64) -> (App<Database>, Arc<MemoryCacheStore>, Database, i64) {
    let db = Database::open(":memory:").await.unwrap();
    let ada = db.create_user("Ada", None).await.unwrap();
    let grace = db.create_user("Grace", None).await.unwrap();
    let tweet = db.create_tweet_at(ada, "first draft", 100).await.unwrap();
    db.create_tweet_at(grace, "hello all", 200).await.unwrap();
    assert_eq!((ada, grace), (1, 2));

    let store = Arc::new(MemoryCacheStore::default());
    let session = Session::authenticated(viewer);
    let loader = FeedLoader::new(Arc::new(db.clone()), store.clone(), Some(viewer));
    for key in PartitionKey::affected_by(ada) {
        loader.load_next_page(key).await.unwrap();
    }
    let dispatcher = Dispatcher::new(
        Arc::new(db.clone()),
        Patcher::new(store.clone()),
        session,
    );
    (App::new(dispatcher, loader), store, db, tweet)
}

fn card_for(app: &App<Database>, store: &MemoryCacheStore, id: i64, listeners: &PointerListeners) -> ItemCard {
    let item = store
        .read(&PartitionKey::GLOBAL)
        .and_then(|p| p.find(id).cloned())
        .unwrap();
    ItemCard::new(
        item,
        app.dispatcher.session(),
        listeners,
        MENU,
        app.dispatcher.max_content_length(),
    )
}

#[tokio::test]
async fn test_author_edits_through_card() {
    let (mut app, store, db, tweet) = setup(1).await;
    let listeners = PointerListeners::new();
    let mut card = card_for(&app, &store, tweet, &listeners);
    let (tx, mut rx) = mpsc::channel(8);

    card.toggle_menu().unwrap();
    card.choose(MenuAction::Edit, &app.dispatcher, &tx).unwrap();
    assert!(card.set_draft("  second draft  "));
    card.submit_edit(&app.dispatcher, &tx).unwrap();
    assert_eq!(card.edit_state(), &EditState::Viewing);

    assert_eq!(run_until_idle(&mut app, &mut rx).await.unwrap(), Exit::Idle);
    assert!(app.status_message.is_none());

    for key in PartitionKey::affected_by(1) {
        let partition = store.read(&key).unwrap();
        assert_eq!(&*partition.find(tweet).unwrap().content, "second draft");
    }
    let stored = db.get_tweet(None, tweet).await.unwrap().unwrap();
    assert_eq!(&*stored.content, "second draft");
}

#[tokio::test]
async fn test_bystander_sees_no_menu_but_can_like() {
    let (mut app, store, _db, tweet) = setup(2).await;
    let listeners = PointerListeners::new();
    let mut card = card_for(&app, &store, tweet, &listeners);
    let (tx, mut rx) = mpsc::channel(8);

    assert!(!card.has_menu());
    assert!(matches!(
        card.choose(MenuAction::Delete, &app.dispatcher, &tx),
        Err(CardError::NotPermitted)
    ));

    card.toggle_like(&app.dispatcher, &tx).unwrap();
    assert!(card.is_like_pending(&app.dispatcher));
    run_until_idle(&mut app, &mut rx).await.unwrap();
    assert!(!card.is_like_pending(&app.dispatcher));

    let global = store.read(&PartitionKey::GLOBAL).unwrap();
    assert!(card.refresh(&global));
    assert_eq!(card.item().like_count, 1);
    assert!(card.item().liked_by_me);
}

#[tokio::test]
async fn test_menu_dismissed_by_outside_click() {
    let (app, store, _db, tweet) = setup(1).await;
    let listeners = PointerListeners::new();
    let mut card = card_for(&app, &store, tweet, &listeners);

    let mut document = Document::new();
    document.insert_root(1);
    document.insert(MENU, 1);
    document.insert(3, MENU);
    document.insert(4, 1);

    card.toggle_menu().unwrap();
    listeners.pointer_down(&document, &PointerDown::on(3));
    assert!(card.is_menu_open());

    listeners.pointer_down(&document, &PointerDown::on(4));
    assert!(!card.is_menu_open());
    assert!(listeners.is_empty());
}

#[tokio::test]
async fn test_delete_through_card_empties_profile() {
    let (mut app, store, _db, tweet) = setup(1).await;
    let listeners = PointerListeners::new();
    let mut card = card_for(&app, &store, tweet, &listeners);
    let (tx, mut rx) = mpsc::channel(8);

    card.choose(MenuAction::Delete, &app.dispatcher, &tx).unwrap();
    run_until_idle(&mut app, &mut rx).await.unwrap();

    assert!(store.read(&PartitionKey::profile(1)).unwrap().is_empty());
    let global = store.read(&PartitionKey::GLOBAL).unwrap();
    assert!(!card.refresh(&global));
    assert_eq!(global.len(), 1);
}
