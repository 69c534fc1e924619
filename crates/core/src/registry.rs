//! The capability registry.
//!
//! Populated once at startup from a fixed manifest, then shared read-only
//! (behind an `Arc`) for the rest of the process. The conversation loop uses
//! it to:
//! 1. List the function surface sent to the model
//! 2. Resolve a requested name to its spec and implementation

use std::collections::HashMap;
use std::sync::Arc;

use crate::capability::{Capability, CapabilitySpec, DELEGATE_CAPABILITY};
use crate::error::RegistryError;
use crate::provider::ToolDefinition;

struct Entry {
    spec: CapabilitySpec,
    implementation: Arc<dyn Capability>,
}

/// Name-keyed, registration-ordered set of capabilities.
///
/// Duplicate names are rejected rather than overwritten, so the function
/// list sent to the model is fully determined by the startup manifest.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under the name its spec declares.
    ///
    /// The spec is captured once here and never re-read from the
    /// implementation.
    pub fn register(&mut self, implementation: Arc<dyn Capability>) -> Result<(), RegistryError> {
        let spec = implementation.spec();
        if spec.name == DELEGATE_CAPABILITY {
            return Err(RegistryError::ReservedName(spec.name));
        }
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateCapability(spec.name));
        }
        self.index.insert(spec.name.clone(), self.entries.len());
        self.entries.push(Entry {
            spec,
            implementation,
        });
        Ok(())
    }

    /// Resolve a name to its spec and implementation.
    pub fn lookup(
        &self,
        name: &str,
    ) -> Result<(&CapabilitySpec, Arc<dyn Capability>), RegistryError> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::UnknownCapability(name.to_string()))?;
        Ok((&entry.spec, entry.implementation.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All specs, in registration order.
    pub fn list_specs(&self) -> Vec<CapabilitySpec> {
        self.entries.iter().map(|e| e.spec.clone()).collect()
    }

    /// All specs as function definitions for the model, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(|e| e.spec.to_definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.spec.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
