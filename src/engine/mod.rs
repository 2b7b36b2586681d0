//! Engine layer — optimistic invocation over host collaborators.
//!
//! # Overview
//!
//! [`Engine`] ties the registry, the overlay, and the host traits together:
//! `invoke` applies the resolved descriptor's script to the overlay and then
//! dispatches the real remote call, releasing the speculative state when the
//! call settles.
//!
//! # Modules
//!
//! - [`host`] — [`StateSource`], [`RemoteTransport`], [`RemoteError`].
//! - [`manager`] — [`Engine`] and [`EngineOptions`].

pub mod host;
pub mod manager;

pub use host::{RemoteError, RemoteTransport, StateSource};
pub use manager::{Engine, EngineOptions};
