//! Secret backend collaborator contracts.
//!
//! The resolver never talks to a real vault or reads the process
//! environment directly; it goes through these seams so deployments wire in
//! their own clients and tests inject stubs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OpsError;

/// A vault backend able to read KV v2 secrets through a named connection
/// profile. Reads should be bounded by the caller-supplied timeout where
/// given; this crate does not retry.
#[async_trait]
pub trait VaultClient: Send + Sync {
    async fn kv2_get(
        &self,
        profile: &str,
        path: &str,
        timeout_ms: Option<u64>,
    ) -> Result<String, OpsError>;
}

/// A stored connection profile, as enumerated for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ProfileRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: HashMap::new(),
        }
    }
}

/// Enumerates stored connection profiles of a given kind (e.g. `"vault"`).
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn list_profiles(&self, kind: &str) -> Result<Vec<ProfileRecord>, OpsError>;
}

/// The slice of a project context the profile selector cares about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectTarget {
    pub vault_profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectContext {
    pub target: ProjectTarget,
}

/// Best-effort lookup of the current project/target context. Failures are
/// treated as "no opinion" by the profile selector, never propagated.
#[async_trait]
pub trait ProjectResolver: Send + Sync {
    async fn resolve_context(&self, args: &Value) -> Result<ProjectContext, OpsError>;
}

/// Narrow accessor for `ref:env:` reads, so resolution logic is testable
/// without mutating real process state.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// Read the real process environment. Names are used as given, with no
    /// namespacing or prefix requirement.
    #[default]
    Process,
    /// A fixed mapping, for tests.
    Map(HashMap<String, String>),
}

impl EnvSource {
    pub fn get(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Map(vars) => vars.get(name).cloned(),
        }
    }
}
