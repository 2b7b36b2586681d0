//! Change notification for the overlay store.
//!
//! Listeners are stored as `Arc<dyn Fn(&OverlayEvent)>` so emit snapshots are
//! cheap. Snapshot-on-emit semantics mean:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is NOT called until the next emit.
//!
//! Listener panics are caught and logged here: a broken observer must not
//! poison the overlay, which still has to unwind at settlement.
//!
//! All methods take `&self` (interior mutability via `parking_lot::Mutex`),
//! and the lock is never held during callbacks, so listeners may
//! subscribe/unsubscribe reentrantly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A change to the overlay, emitted after the store lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    /// A speculative entity was inserted.
    Created { state_path: String, id: String },
    /// Speculative field edits were merged into an entry.
    Updated { state_path: String, id: String },
    /// An entry was marked deleted.
    Removed { state_path: String, id: String },
    /// A settlement released one reference; `dropped` is true when the entry
    /// left the overlay.
    Unwound {
        state_path: String,
        id: String,
        dropped: bool,
    },
}

impl OverlayEvent {
    /// The state path that was affected.
    pub fn state_path(&self) -> &str {
        match self {
            Self::Created { state_path, .. } => state_path,
            Self::Updated { state_path, .. } => state_path,
            Self::Removed { state_path, .. } => state_path,
            Self::Unwound { state_path, .. } => state_path,
        }
    }

    /// The entity id that was affected.
    pub fn id(&self) -> &str {
        match self {
            Self::Created { id, .. } => id,
            Self::Updated { id, .. } => id,
            Self::Removed { id, .. } => id,
            Self::Unwound { id, .. } => id,
        }
    }
}

/// A listener ID returned by [`ChangeEmitter::on`] that can be passed to
/// [`ChangeEmitter::off`] to remove the listener.
pub type ListenerId = u64;

/// Closure type for overlay change listeners.
pub type ListenerFn = dyn Fn(&OverlayEvent) + Send + Sync;

/// Returned by subscribe methods; call it to remove the listener.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Synchronous emitter for [`OverlayEvent`]s.
pub struct ChangeEmitter {
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn>)>>,
    next_id: AtomicU64,
}

impl ChangeEmitter {
    /// Create a new, empty emitter.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` and return its [`ListenerId`].
    pub fn on(&self, callback: impl Fn(&OverlayEvent) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove the listener identified by `id`.
    ///
    /// Does nothing if `id` is not present (safe to call multiple times).
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Emit `event` to all currently registered listeners.
    ///
    /// A snapshot of the listener list is taken before iteration so that
    /// additions or removals during a callback do not affect the current
    /// round. The lock is released before any callback runs. A panicking
    /// listener is logged and skipped.
    pub fn emit(&self, event: &OverlayEvent) {
        // Snapshot Arc references under the lock (cheap: just ref-count bumps).
        let snapshot: Vec<Arc<ListenerFn>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                cb(event);
            }));
            if result.is_err() {
                tracing::error!(?event, "overlay change listener panicked");
            }
        }
    }

    /// Number of currently registered listeners.
    pub fn size(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Default for ChangeEmitter {
    fn default() -> Self {
        Self::new()
    }
}
