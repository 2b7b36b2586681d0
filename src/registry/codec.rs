//! Descriptor blob encoding.
//!
//! The host ships its operation table as one opaque token: a JSON object
//! keyed by operation name, base64-encoded so it can sit in an HTML
//! attribute or a config string without escaping concerns.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::RegistryError;
use crate::registry::descriptor::OperationDescriptor;

/// Encode descriptors as the base64 wire blob.
///
/// Keys follow descriptor names; `BTreeMap` keeps the output stable for a
/// given set.
pub fn encode(descriptors: &[OperationDescriptor]) -> Result<String, RegistryError> {
    let keyed: BTreeMap<&str, &OperationDescriptor> = descriptors
        .iter()
        .map(|descriptor| (descriptor.name.as_str(), descriptor))
        .collect();
    let json = serde_json::to_vec(&keyed)?;
    Ok(STANDARD.encode(json))
}

/// Decode a wire blob back into descriptors.
///
/// Each entry's key must equal its descriptor's `name`; a mismatch means the
/// blob was assembled wrong and is rejected rather than silently re-keyed.
pub fn decode(blob: &str) -> Result<Vec<OperationDescriptor>, RegistryError> {
    let json = STANDARD.decode(blob.trim())?;
    let keyed: BTreeMap<String, OperationDescriptor> = serde_json::from_slice(&json)?;

    let mut descriptors = Vec::with_capacity(keyed.len());
    for (key, descriptor) in keyed {
        if key != descriptor.name {
            return Err(RegistryError::KeyMismatch {
                key,
                name: descriptor.name,
            });
        }
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}
