use std::borrow::Cow;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::cache::{Cursor, Page, Partition, PartitionKey};
use crate::feed::FeedLoader;
use crate::mutation::{Dispatcher, MutationError, MutationOutcome, MutationService, PendingMutation};

/// How long a status line stays visible.
const STATUS_TTL_SECS: u64 = 3;

/// Results of background tasks, delivered to the event loop.
///
/// Background tasks never touch the cache themselves; the loop applies their
/// results so every cache write happens on one task.
#[derive(Debug)]
pub enum AppEvent {
    /// A spawned mutation's remote call finished (or panicked).
    ///
    /// Fields:
    /// - `pending`: the mutation as it was after its optimistic patch
    /// - `result`: the server's answer, passed to `Dispatcher::settle`
    MutationSettled {
        pending: PendingMutation,
        result: Result<MutationOutcome, MutationError>,
    },
    /// A spawned page fetch finished.
    ///
    /// Fields:
    /// - `key`: partition the page belongs to
    /// - `after`: cursor the fetch started after, used to drop stale pages
    /// - `result`: the page, or the error message
    PageLoaded {
        key: PartitionKey,
        after: Option<Cursor>,
        result: Result<Page, String>,
    },
}

/// Event-loop state: the engine plus what the view needs to show progress.
pub struct App<S: MutationService> {
    pub dispatcher: Dispatcher<S>,
    pub loader: FeedLoader,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,
    loading: HashSet<PartitionKey>,
}

impl<S: MutationService> App<S> {
    pub fn new(dispatcher: Dispatcher<S>, loader: FeedLoader) -> Self {
        Self {
            dispatcher,
            loader,
            status_message: None,
            needs_redraw: true,
            loading: HashSet::new(),
        }
    }

    /// Current cached contents of `key`.
    pub fn partition(&self, key: &PartitionKey) -> Option<Partition> {
        self.dispatcher.patcher().read(key)
    }

    /// Start loading the next page of `key` in the background.
    ///
    /// At most one load per partition runs at a time. Returns `false` if a
    /// load is already running or the partition is exhausted.
    pub fn request_next_page(&mut self, key: PartitionKey, event_tx: &mpsc::Sender<AppEvent>) -> bool {
        if self.loading.contains(&key) {
            return false;
        }
        if !self.loader.spawn_next_page(key, event_tx) {
            return false;
        }
        self.loading.insert(key);
        true
    }

    pub fn is_loading(&self, key: &PartitionKey) -> bool {
        self.loading.contains(key)
    }

    pub(crate) fn finish_loading(&mut self, key: &PartitionKey) {
        self.loading.remove(key);
    }

    /// No mutation is awaiting settlement and no page is loading.
    pub fn is_idle(&self) -> bool {
        self.dispatcher.pending_count() == 0 && self.loading.is_empty()
    }

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired.
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore, Patcher};
    use crate::feed::FeedSource;
    use crate::mutation::fake::FakeService;
    use crate::session::Session;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time;

    struct EmptySource;

    #[async_trait]
    impl FeedSource for EmptySource {
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

    fn test_app() -> App<FakeService> {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::default());
        let dispatcher = Dispatcher::new(
            Arc::new(FakeService::new()),
            Patcher::new(Arc::clone(&store)),
            Session::authenticated(1),
        );
        let loader = FeedLoader::new(Arc::new(EmptySource), store, Some(1));
        App::new(dispatcher, loader)
    }

    #[tokio::test]
    async fn test_status_expires_after_3_seconds() {
        let mut app = test_app();
        time::pause();
        app.set_status("Test message");

        time::advance(Duration::from_secs(2)).await;
        assert!(!app.clear_expired_status());
        assert!(app.status_message.is_some());

        time::advance(Duration::from_secs(2)).await;
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_one_load_per_partition() {
        let mut app = test_app();
        let (tx, _rx) = mpsc::channel(4);

        assert!(app.request_next_page(PartitionKey::GLOBAL, &tx));
        assert!(!app.request_next_page(PartitionKey::GLOBAL, &tx));
        assert!(app.request_next_page(PartitionKey::FOLLOWING, &tx));
        assert!(!app.is_idle());

        app.finish_loading(&PartitionKey::GLOBAL);
        app.finish_loading(&PartitionKey::FOLLOWING);
        assert!(app.is_idle());
    }
}
