//! Registry layer — named operation descriptors.
//!
//! # Overview
//!
//! [`OperationRegistry`] maps operation names to validated
//! [`OperationDescriptor`]s. It is immutable once built: construct it from
//! descriptors assembled in process ([`from_descriptors`]) or from the
//! base64 blob a host embeds ([`from_blob`]). Every entry passes
//! [`OperationDescriptor::validate`] before the registry exists, so the
//! engine never re-checks descriptors at invoke time.
//!
//! [`from_descriptors`]: OperationRegistry::from_descriptors
//! [`from_blob`]: OperationRegistry::from_blob
//!
//! # Modules
//!
//! - [`descriptor`] — [`OperationDescriptor`], [`Script`], [`DescriptorBuilder`].
//! - [`rules`] — advisory [`Rule`]s and [`validate_args`].
//! - [`codec`] — the base64 descriptor blob.

pub mod codec;
pub mod descriptor;
pub mod rules;

pub use descriptor::{
    operation, CrudKind, DescriptorBuilder, OperationDescriptor, ParamType, Script, ScriptOp,
    ValueTemplate,
};
pub use rules::{validate_args, Rule, RuleSet};

use std::collections::BTreeMap;

use crate::error::RegistryError;

// ============================================================================
// OperationRegistry
// ============================================================================

/// Immutable name-to-descriptor table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRegistry {
    descriptors: BTreeMap<String, OperationDescriptor>,
}

impl OperationRegistry {
    /// An empty registry. Every invoke falls through to the transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from descriptors, validating each and rejecting duplicates.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = OperationDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut table = BTreeMap::new();
        for descriptor in descriptors {
            descriptor.validate()?;
            if table.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateOperation(descriptor.name));
            }
            table.insert(descriptor.name.clone(), descriptor);
        }
        Ok(Self { descriptors: table })
    }

    /// Decode a host-embedded base64 blob into a registry.
    pub fn from_blob(blob: &str) -> Result<Self, RegistryError> {
        Self::from_descriptors(codec::decode(blob)?)
    }

    /// Encode this registry as the base64 blob a host would embed.
    pub fn to_blob(&self) -> Result<String, RegistryError> {
        let descriptors: Vec<OperationDescriptor> = self.descriptors.values().cloned().collect();
        codec::encode(&descriptors)
    }

    /// Look up a descriptor by operation name.
    pub fn resolve(&self, name: &str) -> Option<&OperationDescriptor> {
        self.descriptors.get(name)
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }

    /// Distinct state paths touched by registered operations, sorted.
    pub fn state_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .descriptors
            .values()
            .map(|descriptor| descriptor.state_path.as_str())
            .collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.descriptors.values()
    }
}

// ============================================================================
// Tests
// ============================================================================
