use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State path used when a descriptor does not name one.
pub const DEFAULT_STATE_PATH: &str = "default";

/// Generator for provisional entity ids.
/// Wrapped in `Arc` at the engine seam so tests can swap in a deterministic
/// one.
pub type IdGenerator = dyn Fn() -> String + Send + Sync;

/// One row of an effective view: authoritative fields with the speculative
/// overlay merged on top (overlay wins field-by-field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projected {
    pub id: String,
    /// Merged JSON object. Always contains an `id` field equal to `id`.
    pub data: Value,
    /// Entity exists only speculatively, not yet confirmed by the server.
    pub created: bool,
    /// Entity carries speculative field edits.
    pub edited: bool,
}

// ============================================================================
// Tests
// ============================================================================
