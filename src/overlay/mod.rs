//! Overlay layer — the reference-counted speculative state.
//!
//! # Overview
//!
//! [`OverlayStore`] holds pending speculative mutations keyed by state path
//! and entity id. Scripts mutate it through the three primitives
//! (`create`/`update`/`remove`); settlements release their references through
//! `unwind`. Observers subscribe through `on_change`.
//!
//! # Modules
//!
//! - [`entry`] — [`OverlayEntry`].
//! - [`store`] — [`OverlayStore`] and the per-path [`PathOverlay`] map.
//! - [`notify`] — [`OverlayEvent`], [`ChangeEmitter`], [`Unsubscribe`].

pub mod entry;
pub mod notify;
pub mod store;

pub use entry::OverlayEntry;
pub use notify::{ChangeEmitter, ListenerId, OverlayEvent, Unsubscribe};
pub use store::{OverlayStore, PathOverlay};
