//! OverlayEntry — one entity's pending speculative state.

use serde_json::{Map, Value};

/// One entity's speculative state within a state path.
///
/// `fields` always carries an `"id"` member equal to `id`; the primitives
/// keep the two in step so merged views never lose the id. Exactly one flag
/// is set per primitive call, and flags are never cleared by a later
/// primitive — an entry can be both `created` and `deleted` while a create
/// and a remove are in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEntry {
    pub id: String,
    pub fields: Map<String, Value>,
    pub created: bool,
    pub edited: bool,
    pub deleted: bool,
    /// Outstanding speculative operations referencing this entry.
    pub refcount: u32,
}

impl OverlayEntry {
    /// The speculative fields as a JSON object value.
    pub fn data(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
