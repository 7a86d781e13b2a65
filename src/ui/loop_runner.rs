//! Event loop that drains background results into the cache.

use crate::app::{App, AppEvent};
use crate::mutation::MutationService;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::handle_app_event;

/// Why [`run_until_idle`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Every mutation settled and every page load finished.
    Idle,
    /// All senders were dropped while work was still outstanding.
    Disconnected,
    /// SIGINT or SIGTERM.
    Interrupted,
}

/// Process background events until the app is idle.
///
/// Uses `tokio::select!` to multiplex shutdown signals, background task
/// results and a 250ms tick that expires status messages. Pending events are
/// drained before each wait so a burst of settlements is applied together.
pub async fn run_until_idle<S: MutationService>(
    app: &mut App<S>,
    event_rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<Exit> {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    // On non-Unix platforms these become pending futures that never complete
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        while let Ok(event) = event_rx.try_recv() {
            handle_app_event(app, event);
        }
        if app.is_idle() {
            return Ok(Exit::Idle);
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, abandoning outstanding work");
                return Ok(Exit::Interrupted);
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, abandoning outstanding work");
                return Ok(Exit::Interrupted);
            }

            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => handle_app_event(app, event),
                    None => {
                        tracing::warn!(
                            pending = app.dispatcher.pending_count(),
                            "Event channel closed with work outstanding"
                        );
                        return Ok(Exit::Disconnected);
                    }
                }
            }

            _ = tick_interval.tick() => {
                if app.clear_expired_status() {
                    app.needs_redraw = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{
        Author, CacheStore, Cursor, Item, MemoryCacheStore, Page, Partition, PartitionKey, Patcher,
    };
    use crate::feed::{FeedLoader, FeedSource};
    use crate::mutation::fake::FakeService;
    use crate::mutation::{Command, Dispatcher};
    use crate::session::Session;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct NoPages;

    #[async_trait]
    impl FeedSource for NoPages {
        async fn fetch_page(
            &self,
            _viewer: Option<i64>,
            _key: PartitionKey,
            _after: Option<Cursor>,
            _limit: usize,
        ) -> anyhow::Result<Page> {
            Ok(Page::new(Vec::new(), None))
        }
    }

    fn app_with(items: Vec<Item>) -> (App<FakeService>, Arc<MemoryCacheStore>) {
        let store = Arc::new(MemoryCacheStore::default());
        for key in PartitionKey::affected_by(2) {
            store.write(key, Partition::new(vec![Page::new(items.clone(), None)]));
        }
        let dispatcher = Dispatcher::new(
            Arc::new(FakeService::new()),
            Patcher::new(store.clone()),
            Session::authenticated(2),
        );
        let loader = FeedLoader::new(Arc::new(NoPages), store.clone(), Some(2));
        (App::new(dispatcher, loader), store)
    }

    fn item(id: i64) -> Item {
        Item {
            id,
            content: Arc::from("draft"),
            created_at: 1_700_000_000 + id,
            like_count: 0,
            liked_by_me: false,
            author: Author {
                id: 2,
                name: Some(Arc::from("Ada")),
                avatar: None,
            },
        }
    }

    #[tokio::test]
    async fn test_runs_until_every_mutation_settles() {
        let (mut app, store) = app_with(vec![item(1), item(2)]);
        let (tx, mut rx) = mpsc::channel(8);

        app.dispatcher
            .spawn(Command::LikeToggle { item_id: 1 }, 2, &tx)
            .unwrap();
        app.dispatcher.spawn(Command::Delete { item_id: 2 }, 2, &tx).unwrap();
        app.dispatcher
            .spawn(
                Command::Edit {
                    item_id: 1,
                    content: " edited ".to_string(),
                },
                2,
                &tx,
            )
            .unwrap();

        let exit = run_until_idle(&mut app, &mut rx).await.unwrap();
        assert_eq!(exit, Exit::Idle);

        for key in PartitionKey::affected_by(2) {
            let partition = store.read(&key).unwrap();
            let ids: Vec<i64> = partition.items().map(|i| i.id).collect();
            assert_eq!(ids, vec![1]);
            let survivor = partition.find(1).unwrap();
            assert_eq!(&*survivor.content, "edited");
            assert_eq!(survivor.like_count, 1);
        }
    }

    #[tokio::test]
    async fn test_idle_app_returns_immediately() {
        let (mut app, _store) = app_with(Vec::new());
        let (_tx, mut rx) = mpsc::channel::<AppEvent>(1);
        assert_eq!(run_until_idle(&mut app, &mut rx).await.unwrap(), Exit::Idle);
    }

    #[tokio::test]
    async fn test_closed_channel_with_outstanding_load() {
        let (mut app, _store) = app_with(Vec::new());
        let (tx, mut rx) = mpsc::channel(1);
        // The load is registered but its result can never arrive.
        assert!(app.request_next_page(PartitionKey::profile(7), &tx));
        drop(tx);
        rx.close();

        assert_eq!(
            run_until_idle(&mut app, &mut rx).await.unwrap(),
            Exit::Disconnected
        );
    }
}
