//! Bindings — the facade a presentation layer talks to.
//!
//! Wraps an [`Engine`] and its [`Projector`] behind the handful of calls a
//! UI binding needs: by-name dispatch, per-path projections, per-entity flag
//! checks, and change notification. Everything here delegates; no state of
//! its own beyond the shared handles.

use std::sync::Arc;

use serde_json::Value;

use crate::engine::Engine;
use crate::error::InvokeError;
use crate::overlay::{OverlayEntry, OverlayEvent, OverlayStore, Unsubscribe};
use crate::types::Projected;
use crate::view::Projector;

// ============================================================================
// Bindings
// ============================================================================

/// Presentation-facing handle over one engine.
#[derive(Clone)]
pub struct Bindings {
    engine: Arc<Engine>,
    projector: Projector,
    overlay: Arc<OverlayStore>,
}

impl Bindings {
    pub fn new(engine: Arc<Engine>) -> Self {
        let projector = engine.projector();
        let overlay = engine.overlay();
        Self {
            engine,
            projector,
            overlay,
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Invoke a registered operation by name. See [`Engine::invoke`].
    pub async fn call(&self, operation: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        self.engine.invoke(operation, args).await
    }

    /// Registered operation names, for hosts building per-operation callables.
    pub fn operations(&self) -> Vec<String> {
        self.engine
            .registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// State paths any registered operation touches, for hosts building
    /// per-path getters.
    pub fn state_paths(&self) -> Vec<String> {
        self.engine
            .registry()
            .state_paths()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Projections
    // -----------------------------------------------------------------------

    /// Merged view of one state path. See [`Projector::combined`].
    pub fn combined(&self, state_path: &str) -> Vec<Projected> {
        self.projector.combined(state_path)
    }

    /// Unsettled pure creations of one state path. See
    /// [`Projector::pending_only`].
    pub fn pending_only(&self, state_path: &str) -> Vec<Projected> {
        self.projector.pending_only(state_path)
    }

    // -----------------------------------------------------------------------
    // Per-entity flags
    // -----------------------------------------------------------------------

    pub fn is_removed(&self, state_path: &str, id: &str) -> bool {
        self.overlay.is_removed(state_path, id)
    }

    pub fn is_edited(&self, state_path: &str, id: &str) -> bool {
        self.overlay.is_edited(state_path, id)
    }

    pub fn is_created(&self, state_path: &str, id: &str) -> bool {
        self.overlay.is_created(state_path, id)
    }

    /// The raw overlay entry for an id, if one is pending.
    pub fn find(&self, state_path: &str, id: &str) -> Option<OverlayEntry> {
        self.overlay.entry(state_path, id)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Pre-allocate an id with the engine's generator.
    pub fn generate_id(&self) -> String {
        self.engine.generate_id()
    }

    /// Whether unconfirmed mutations exist. Hosts check this before
    /// navigation-away to warn about discarding unsettled work.
    pub fn has_pending(&self) -> bool {
        self.engine.has_pending()
    }

    pub fn pending_count(&self) -> usize {
        self.engine.pending_count()
    }

    /// Subscribe to overlay changes. Presentation layers re-project the
    /// affected state path when called.
    pub fn on_change(
        &self,
        callback: impl Fn(&OverlayEvent) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.overlay.on_change(callback)
    }
}

// ============================================================================
// Tests
// ============================================================================
