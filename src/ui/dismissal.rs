//! Close-on-outside-click behaviour for transient overlays.
//!
//! An open overlay registers one document-level pointer listener. A
//! pointer-down outside the overlay's boundary node closes it. The listener is
//! owned through a [`ListenerHandle`] that detaches it exactly once: when the
//! overlay closes, or when the owning controller is dropped.
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Identity of a node in the rendered [`Document`].
pub type NodeId = u64;

// ============================================================================
// Document
// ============================================================================

/// Parent-linked node tree of the rendered view.
#[derive(Debug, Clone, Default)]
pub struct Document {
    parents: HashMap<NodeId, Option<NodeId>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_root(&mut self, id: NodeId) {
        self.parents.insert(id, None);
    }

    /// Attach a new node `id` under `parent`.
    ///
    /// Returns `false` if `parent` is not in the tree or `id` already is;
    /// nodes are never re-parented, so the tree stays acyclic.
    pub fn insert(&mut self, id: NodeId, parent: NodeId) -> bool {
        if !self.parents.contains_key(&parent) || self.parents.contains_key(&id) {
            return false;
        }
        self.parents.insert(id, Some(parent));
        true
    }

    /// Remove `id` and everything below it.
    pub fn remove(&mut self, id: NodeId) {
        let doomed: Vec<NodeId> = self
            .parents
            .keys()
            .copied()
            .filter(|node| self.is_within(*node, id))
            .collect();
        for node in doomed {
            self.parents.remove(&node);
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.parents.contains_key(&id)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    ///
    /// A node missing from the tree is never within anything.
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(parent) = self.parents.get(&id) else {
                return false;
            };
            if id == ancestor {
                return true;
            }
            current = *parent;
        }
        false
    }
}

/// A pointer-down anywhere in the view.
///
/// `target` is `None` when the event did not land on a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerDown {
    pub target: Option<NodeId>,
}

impl PointerDown {
    pub fn on(target: NodeId) -> Self {
        Self {
            target: Some(target),
        }
    }

    pub fn outside_document() -> Self {
        Self { target: None }
    }
}

// ============================================================================
// Listener Registry
// ============================================================================

/// What a listener wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    Keep,
    Detach,
}

type Listener = Box<dyn FnMut(&Document, &PointerDown) -> ListenerControl + Send>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Document-level pointer-down listeners.
///
/// Listeners run in registration order while the registry is locked; they must
/// not register or dispose listeners themselves.
#[derive(Clone, Default)]
pub struct PointerListeners {
    inner: Arc<Mutex<Registry>>,
}

impl PointerListeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach `listener`; it stays attached until the returned handle is
    /// disposed or dropped, or the listener returns [`ListenerControl::Detach`].
    pub fn register<F>(&self, listener: F) -> ListenerHandle
    where
        F: FnMut(&Document, &PointerDown) -> ListenerControl + Send + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Box::new(listener));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.inner),
            disposed: false,
        }
    }

    /// Deliver a pointer-down to every attached listener.
    ///
    /// Returns the number of listeners that detached themselves.
    pub fn pointer_down(&self, document: &Document, event: &PointerDown) -> usize {
        let mut registry = self.lock();
        let before = registry.listeners.len();
        registry
            .listeners
            .retain(|_, listener| listener(document, event) == ListenerControl::Keep);
        before - registry.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_registered(&self, id: u64) -> bool {
        self.lock().listeners.contains_key(&id)
    }
}

/// Disposal handle for a registered listener.
///
/// Disposing twice is impossible: [`ListenerHandle::dispose`] consumes the
/// handle and `Drop` skips handles already disposed.
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    disposed: bool,
}

impl ListenerHandle {
    /// Detach the listener now.
    pub fn dispose(mut self) {
        self.detach();
    }

    /// Whether the listener is still registered.
    pub fn is_attached(&self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => PointerListeners { inner }.is_registered(self.id),
            None => false,
        }
    }

    fn detach(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        // Registry already gone means the whole view was torn down
        if let Some(inner) = self.registry.upgrade() {
            PointerListeners { inner }.lock().listeners.remove(&self.id);
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

// ============================================================================
// Dismissal Controller
// ============================================================================

/// Open/closed state of one overlay plus its outside-click listener.
///
/// The listener exists exactly while the overlay is open. Dropping the
/// controller detaches it, so a discarded card can never close an overlay
/// belonging to a newer one.
pub struct DismissalController {
    listeners: PointerListeners,
    boundary: NodeId,
    open: Arc<AtomicBool>,
    handle: Option<ListenerHandle>,
}

impl DismissalController {
    /// `boundary` is the node whose subtree counts as inside the overlay,
    /// usually the element wrapping both the trigger button and the menu.
    pub fn new(listeners: PointerListeners, boundary: NodeId) -> Self {
        Self {
            listeners,
            boundary,
            open: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn boundary(&self) -> NodeId {
        self.boundary
    }

    /// Whether the overlay is open.
    ///
    /// Also releases the handle of a listener that already closed the overlay
    /// and detached itself.
    pub fn is_open(&mut self) -> bool {
        let open = self.open.load(Ordering::SeqCst);
        if !open {
            self.handle = None;
        }
        open
    }

    /// Whether the outside-click listener is registered.
    pub fn is_listening(&self) -> bool {
        self.handle.as_ref().is_some_and(ListenerHandle::is_attached)
    }

    pub fn open(&mut self) {
        if self.is_open() {
            return;
        }
        self.open.store(true, Ordering::SeqCst);

        let open = Arc::clone(&self.open);
        let boundary = self.boundary;
        self.handle = Some(self.listeners.register(move |document, event| {
            let inside = event
                .target
                .is_some_and(|target| document.is_within(target, boundary));
            if inside {
                return ListenerControl::Keep;
            }
            tracing::trace!(boundary, target = ?event.target, "Pointer down outside overlay, closing");
            open.store(false, Ordering::SeqCst);
            ListenerControl::Detach
        }));
    }

    pub fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.dispose();
        }
    }

    pub fn toggle(&mut self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }
}
