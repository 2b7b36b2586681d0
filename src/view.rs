//! View projection — authoritative data merged with the overlay.
//!
//! [`Projector`] is the read side of the crate: it never caches, never
//! mutates, and recomputes from the current authoritative snapshot and the
//! current overlay on every call. Presentation layers re-run it whenever
//! either input reports a change.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::engine::StateSource;
use crate::overlay::OverlayStore;
use crate::types::Projected;

// ============================================================================
// Projector
// ============================================================================

/// Pure merge of host state and speculative overlay for one state path.
#[derive(Clone)]
pub struct Projector {
    source: Arc<dyn StateSource>,
    overlay: Arc<OverlayStore>,
}

impl Projector {
    pub fn new(source: Arc<dyn StateSource>, overlay: Arc<OverlayStore>) -> Self {
        Self { source, overlay }
    }

    /// Authoritative entities with overlay effects applied, then overlay-only
    /// entities.
    ///
    /// Authoritative order is preserved; overlay fields win field-by-field;
    /// entities whose overlay entry is `deleted` are dropped. Entities the
    /// overlay does not know append nothing — an empty overlay is a pure
    /// pass-through of host data.
    pub fn combined(&self, state_path: &str) -> Vec<Projected> {
        let overlay = self.overlay.snapshot(state_path);
        let authoritative = self.source.get_state(state_path);

        let mut projected = Vec::with_capacity(authoritative.len() + overlay.len());
        let mut seen: HashSet<String> = HashSet::new();

        for entity in authoritative {
            let Value::Object(mut fields) = entity else {
                tracing::warn!(%state_path, "authoritative entity is not an object; skipped");
                continue;
            };
            // Numeric host ids are stringified to line up with overlay keys.
            let Some(id) = entity_id(&fields) else {
                tracing::warn!(%state_path, "authoritative entity without a usable id; skipped");
                continue;
            };

            let Some(entry) = overlay.get(&id) else {
                projected.push(Projected {
                    id,
                    data: Value::Object(fields),
                    created: false,
                    edited: false,
                });
                continue;
            };

            seen.insert(id.clone());
            if entry.deleted {
                continue;
            }
            for (field, value) in &entry.fields {
                fields.insert(field.clone(), value.clone());
            }
            projected.push(Projected {
                id,
                data: Value::Object(fields),
                created: entry.created,
                edited: entry.edited,
            });
        }

        // Entities that exist only speculatively, in overlay insertion order.
        for (id, entry) in overlay {
            if seen.contains(&id) || entry.deleted {
                continue;
            }
            projected.push(Projected {
                id,
                data: entry.data(),
                created: entry.created,
                edited: entry.edited,
            });
        }

        projected
    }

    /// Overlay entries that are neither `deleted` nor `edited` — pure
    /// speculative creations still awaiting settlement.
    pub fn pending_only(&self, state_path: &str) -> Vec<Projected> {
        self.overlay
            .snapshot(state_path)
            .into_iter()
            .filter(|(_, entry)| !entry.deleted && !entry.edited)
            .map(|(id, entry)| Projected {
                id,
                data: entry.data(),
                created: entry.created,
                edited: entry.edited,
            })
            .collect()
    }
}

fn entity_id(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
