//! Capability storage.
//!
//! The resolver only ever talks to the [`CapabilityStore`] trait; the
//! production store lives in the outer server. [`MemoryCapabilityStore`] is
//! the in-process reference implementation, used by tests and by local
//! deployments that load capability YAML files from disk.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use super::capability::Capability;
use crate::error::OpsError;

/// Storage contract for capability records. Implementations must hand back
/// already-normalized records (see [`Capability::normalize`]).
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    async fn list_capabilities(&self) -> Result<Vec<Capability>, OpsError>;

    /// All candidates whose `intent` equals the argument, in no particular
    /// order. The resolver sorts.
    async fn find_all_by_intent(&self, intent: &str) -> Result<Vec<Capability>, OpsError>;

    async fn get_capability(&self, name: &str) -> Result<Option<Capability>, OpsError>;

    /// Validate and persist. Malformed fields are rejected with
    /// field-scoped errors before anything is stored.
    async fn set_capability(&self, name: &str, value: &Value) -> Result<Capability, OpsError>;

    /// Returns whether the named capability existed.
    async fn delete_capability(&self, name: &str) -> Result<bool, OpsError>;
}

/// In-memory capability store keyed by name.
#[derive(Debug, Default)]
pub struct MemoryCapabilityStore {
    capabilities: RwLock<HashMap<String, Capability>>,
}

impl MemoryCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-normalized capability, stamping provenance if
    /// the record carries none.
    pub fn register(&self, mut capability: Capability) {
        if capability.source.is_none() {
            capability.source = Some("local".to_string());
        }
        self.capabilities
            .write()
            .expect("capability store lock poisoned")
            .insert(capability.name.clone(), capability);
    }

    /// Load a single capability YAML file.
    pub fn load_file(&self, path: &Path) -> Result<Capability, OpsError> {
        let capability = Capability::from_yaml_file(path)?;
        self.register(capability.clone());
        self.get(&capability.name)
            .ok_or_else(|| OpsError::NameNotFound {
                name: capability.name,
            })
    }

    /// Recursively load every `.yaml`/`.yml` file under `dir`. Files that
    /// fail to parse are skipped with a warning rather than aborting the
    /// whole load. Returns the number of capabilities loaded.
    pub fn load_directory(&self, dir: &Path) -> Result<usize, OpsError> {
        let mut count = 0;
        if !dir.exists() {
            return Ok(0);
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                count += self.load_directory(&path)?;
            } else if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                match self.load_file(&path) {
                    Ok(_) => count += 1,
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %err,
                            "skipping unparseable capability file"
                        );
                    }
                }
            }
        }
        Ok(count)
    }

    /// Capabilities carrying the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Vec<Capability> {
        self.capabilities
            .read()
            .expect("capability store lock poisoned")
            .values()
            .filter(|c| c.has_tag(tag))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities
            .read()
            .expect("capability store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, name: &str) -> Option<Capability> {
        self.capabilities
            .read()
            .expect("capability store lock poisoned")
            .get(name)
            .cloned()
    }
}

#[async_trait]
impl CapabilityStore for MemoryCapabilityStore {
    async fn list_capabilities(&self) -> Result<Vec<Capability>, OpsError> {
        let mut all: Vec<Capability> = self
            .capabilities
            .read()
            .expect("capability store lock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn find_all_by_intent(&self, intent: &str) -> Result<Vec<Capability>, OpsError> {
        Ok(self
            .capabilities
            .read()
            .expect("capability store lock poisoned")
            .values()
            .filter(|c| c.intent == intent)
            .cloned()
            .collect())
    }

    async fn get_capability(&self, name: &str) -> Result<Option<Capability>, OpsError> {
        Ok(self.get(name))
    }

    async fn set_capability(&self, name: &str, value: &Value) -> Result<Capability, OpsError> {
        let capability = Capability::normalize(name, value)?;
        self.register(capability.clone());
        Ok(self.get(name).unwrap_or(capability))
    }

    async fn delete_capability(&self, name: &str) -> Result<bool, OpsError> {
        Ok(self
            .capabilities
            .write()
            .expect("capability store lock poisoned")
            .remove(name)
            .is_some())
    }
}
