use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Persistent identifier of a servable model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Serving module name -> entity id.
pub type NamedModelIds = BTreeMap<String, EntityId>;

/// Allocates the identifiers a run needs.
pub trait IdAllocator: Send + Sync {
    fn workflow_id(&self) -> WorkflowId;

    fn entity_id(&self, module_name: &str) -> EntityId;

    /// One fresh id per serving module.
    fn named_entity_ids(&self, module_names: &[String]) -> NamedModelIds {
        module_names
            .iter()
            .map(|name| (name.clone(), self.entity_id(name)))
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdAllocator;

impl IdAllocator for UuidIdAllocator {
    fn workflow_id(&self) -> WorkflowId {
        WorkflowId::new()
    }

    fn entity_id(&self, _module_name: &str) -> EntityId {
        EntityId::new()
    }
}
