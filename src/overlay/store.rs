//! OverlayStore — the in-memory speculative layer.
//!
//! Per state-path mapping from entity id to [`OverlayEntry`],
//! insertion-ordered so unconfirmed creations project in the order they
//! appeared. The store is mutated only by the three primitives
//! (`create`/`update`/`remove`) plus `unwind`; each applied primitive bumps
//! the target entry's refcount, and the reconciliation engine records one
//! matching unwind per bump to run at settlement.
//!
//! Interior mutability via `parking_lot::Mutex` (Send + Sync), shared as
//! `Arc<OverlayStore>` between the engine, settlement tasks, and the view
//! projector. The lock is released before change listeners run.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::entry::OverlayEntry;
use super::notify::{ChangeEmitter, OverlayEvent, Unsubscribe};

/// Overlay for one state path: entity id → entry, in insertion order.
pub type PathOverlay = IndexMap<String, OverlayEntry>;

pub struct OverlayStore {
    /// state path → (entity id → entry)
    paths: Mutex<HashMap<String, PathOverlay>>,
    emitter: Arc<ChangeEmitter>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self {
            paths: Mutex::new(HashMap::new()),
            emitter: Arc::new(ChangeEmitter::new()),
        }
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// Insert a speculative entity with `created = true` and one reference.
    ///
    /// A create for an id already in the overlay is a contract violation by
    /// the calling script: it is logged, the overlay is left untouched, and
    /// `false` is returned so the caller records no unwind for it.
    pub fn create(&self, state_path: &str, id: &str, data: Map<String, Value>) -> bool {
        let inserted = {
            let mut paths = self.paths.lock();
            let path = paths.entry(state_path.to_string()).or_default();
            if path.contains_key(id) {
                false
            } else {
                let mut fields = data;
                fields.insert("id".to_string(), Value::String(id.to_string()));
                path.insert(
                    id.to_string(),
                    OverlayEntry {
                        id: id.to_string(),
                        fields,
                        created: true,
                        edited: false,
                        deleted: false,
                        refcount: 1,
                    },
                );
                true
            }
        };
        if inserted {
            self.emitter.emit(&OverlayEvent::Created {
                state_path: state_path.to_string(),
                id: id.to_string(),
            });
        } else {
            tracing::error!(%state_path, %id, "create for an id already in the overlay; ignored");
        }
        inserted
    }

    /// Merge speculative field edits into `id`, setting `edited = true` and
    /// taking one reference. Creates the entry if absent (an edit without a
    /// seed base).
    pub fn update(&self, state_path: &str, id: &str, data: Map<String, Value>) {
        {
            let mut paths = self.paths.lock();
            let path = paths.entry(state_path.to_string()).or_default();
            match path.get_mut(id) {
                Some(entry) => {
                    for (key, value) in data {
                        entry.fields.insert(key, value);
                    }
                    // The id parameter wins over any "id" key in the data.
                    entry
                        .fields
                        .insert("id".to_string(), Value::String(id.to_string()));
                    entry.edited = true;
                    entry.refcount += 1;
                }
                None => {
                    let mut fields = data;
                    fields.insert("id".to_string(), Value::String(id.to_string()));
                    path.insert(
                        id.to_string(),
                        OverlayEntry {
                            id: id.to_string(),
                            fields,
                            created: false,
                            edited: true,
                            deleted: false,
                            refcount: 1,
                        },
                    );
                }
            }
        }
        self.emitter.emit(&OverlayEvent::Updated {
            state_path: state_path.to_string(),
            id: id.to_string(),
        });
    }

    /// Mark `id` deleted, taking one reference. Creates a tombstone entry if
    /// absent. Existing fields and flags are preserved.
    pub fn remove(&self, state_path: &str, id: &str) {
        {
            let mut paths = self.paths.lock();
            let path = paths.entry(state_path.to_string()).or_default();
            match path.get_mut(id) {
                Some(entry) => {
                    entry.deleted = true;
                    entry.refcount += 1;
                }
                None => {
                    let mut fields = Map::new();
                    fields.insert("id".to_string(), Value::String(id.to_string()));
                    path.insert(
                        id.to_string(),
                        OverlayEntry {
                            id: id.to_string(),
                            fields,
                            created: false,
                            edited: false,
                            deleted: true,
                            refcount: 1,
                        },
                    );
                }
            }
        }
        self.emitter.emit(&OverlayEvent::Removed {
            state_path: state_path.to_string(),
            id: id.to_string(),
        });
    }

    /// Release one reference on `id`; the entry is dropped when the last
    /// reference is released. Releasing more references than were taken is
    /// clamped and logged, never fatal.
    pub fn unwind(&self, state_path: &str, id: &str) {
        let unwound: Option<bool> = {
            let mut paths = self.paths.lock();
            match paths.get_mut(state_path).and_then(|path| {
                path.get_mut(id).map(|entry| {
                    if entry.refcount > 1 {
                        entry.refcount -= 1;
                        false
                    } else {
                        true
                    }
                })
            }) {
                Some(true) => {
                    // shift_remove keeps the remaining entries in order.
                    if let Some(path) = paths.get_mut(state_path) {
                        path.shift_remove(id);
                    }
                    Some(true)
                }
                Some(false) => Some(false),
                None => None,
            }
        };
        match unwound {
            Some(dropped) => self.emitter.emit(&OverlayEvent::Unwound {
                state_path: state_path.to_string(),
                id: id.to_string(),
                dropped,
            }),
            None => {
                tracing::warn!(%state_path, %id, "unwind without a matching overlay entry; ignored")
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Clone of the entry for (`state_path`, `id`), if any.
    pub fn entry(&self, state_path: &str, id: &str) -> Option<OverlayEntry> {
        self.paths
            .lock()
            .get(state_path)
            .and_then(|path| path.get(id))
            .cloned()
    }

    /// Insertion-ordered clone of one state path's overlay.
    pub fn snapshot(&self, state_path: &str) -> PathOverlay {
        self.paths
            .lock()
            .get(state_path)
            .cloned()
            .unwrap_or_default()
    }

    /// True if `id` has a speculative deletion pending in `state_path`.
    pub fn is_removed(&self, state_path: &str, id: &str) -> bool {
        self.flag(state_path, id, |entry| entry.deleted)
    }

    /// True if `id` has speculative edits pending in `state_path`.
    pub fn is_edited(&self, state_path: &str, id: &str) -> bool {
        self.flag(state_path, id, |entry| entry.edited)
    }

    /// True if `id` is a speculative creation pending in `state_path`.
    pub fn is_created(&self, state_path: &str, id: &str) -> bool {
        self.flag(state_path, id, |entry| entry.created)
    }

    fn flag(&self, state_path: &str, id: &str, pick: impl Fn(&OverlayEntry) -> bool) -> bool {
        self.paths
            .lock()
            .get(state_path)
            .and_then(|path| path.get(id))
            .is_some_and(pick)
    }

    /// Number of pending entries across all state paths.
    pub fn pending_count(&self) -> usize {
        self.paths.lock().values().map(|path| path.len()).sum()
    }

    /// True if any state path has pending entries. Hosts check this before
    /// unload to warn about unconfirmed mutations.
    pub fn has_pending(&self) -> bool {
        self.paths.lock().values().any(|path| !path.is_empty())
    }

    // ------------------------------------------------------------------
    // Change notification
    // ------------------------------------------------------------------

    /// Subscribe to overlay changes. Returns an unsubscribe closure.
    pub fn on_change(
        &self,
        callback: impl Fn(&OverlayEvent) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.emitter.on(callback);
        let emitter = Arc::clone(&self.emitter);
        Box::new(move || emitter.off(id))
    }

    /// Number of registered change listeners.
    pub fn listener_count(&self) -> usize {
        self.emitter.size()
    }
}

impl Default for OverlayStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
