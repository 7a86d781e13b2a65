//! In-memory [`MutationService`] for unit tests.
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::service::{MutationService, ServiceError};
use crate::cache::{ItemId, UserId};

#[derive(Default)]
pub(crate) struct FakeService {
    liked: Mutex<HashSet<ItemId>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Items the viewer has already liked on the server.
    pub(crate) fn with_liked(self, ids: &[ItemId]) -> Self {
        self.liked.lock().unwrap().extend(ids.iter().copied());
        self
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MutationService for FakeService {
    async fn toggle_like(&self, _viewer: UserId, item_id: ItemId) -> Result<bool, ServiceError> {
        self.enter()?;
        let mut liked = self.liked.lock().unwrap();
        if liked.remove(&item_id) {
            Ok(false)
        } else {
            liked.insert(item_id);
            Ok(true)
        }
    }

    async fn edit(
        &self,
        _viewer: UserId,
        _item_id: ItemId,
        content: &str,
    ) -> Result<String, ServiceError> {
        self.enter()?;
        Ok(content.trim().to_string())
    }

    async fn delete(&self, _viewer: UserId, _item_id: ItemId) -> Result<(), ServiceError> {
        self.enter()
    }
}
