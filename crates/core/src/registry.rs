use crate::error::RegistryError;
use crate::tool::{Tool, ToolDefinition};
use std::collections::HashMap;
use std::sync::Arc;

struct ToolEntry {
    definition: ToolDefinition,
    tool: Arc<dyn Tool>,
}

/// The fixed set of tools available to one agent profile.
///
/// Built once when the profile is assembled and never mutated afterwards, so
/// it can be shared between calls behind an `Arc`. Tool names are unique.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Registers `tools` in order, rejecting duplicate names.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for tool in tools {
            let definition = tool.definition();
            if registry.by_name.contains_key(&definition.name) {
                return Err(RegistryError::DuplicateTool(definition.name));
            }
            registry
                .by_name
                .insert(definition.name.clone(), registry.entries.len());
            registry.entries.push(ToolEntry { definition, tool });
        }
        Ok(registry)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up a tool by the function name the model called.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name
            .get(name)
            .map(|&idx| Arc::clone(&self.entries[idx].tool))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Definitions in registration order, for the session options.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(|e| e.definition.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.definition.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
