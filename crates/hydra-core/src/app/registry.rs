//! StageRegistry - stage name -> stage.
//!
//! Built during initialization (mutable), read by the runner afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ports::Stage;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("stage '{0}' is already registered")]
    DuplicateStage(String),

    #[error("stage name must not be empty")]
    EmptyName,
}

#[derive(Default)]
pub struct StageRegistry {
    stages: BTreeMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage under its own name. Names double as claim tags, so
    /// two stages may not share one.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> Result<(), RegistryError> {
        let name = stage.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.stages.contains_key(&name) {
            return Err(RegistryError::DuplicateStage(name));
        }
        self.stages.insert(name, stage);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.stages.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.stages.keys().cloned().collect()
    }

    pub fn stages(&self) -> impl Iterator<Item = &Arc<dyn Stage>> {
        self.stages.values()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
