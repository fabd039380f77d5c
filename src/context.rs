//! Execution context snapshots.
//!
//! A [`Context`] is the runtime state a when-clause is evaluated against:
//! a set of tags plus a sandbox root directory for file-existence probes.
//! Contexts are produced per resolution call by an external
//! [`ContextProvider`]; this crate never persists them.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OpsError;

/// An ephemeral snapshot of the environment a capability may activate in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    /// Identifies which context was selected (e.g. an environment name).
    pub key: String,

    /// Sandbox root for `files_any` / `files_all` checks. Without a root,
    /// every file check resolves to non-existent.
    pub root: Option<PathBuf>,

    /// Tags held by this context, matched by `tags_any` / `tags_all`.
    pub tags: HashSet<String>,

    /// Pre-seeded file-existence cache, keyed by the literal path string.
    /// Evaluation merges into and updates this map.
    pub files: HashMap<String, bool>,
}

impl Context {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Produces a [`Context`] for a resolution call. Implemented by the outer
/// server, which knows how to map request arguments onto an environment.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn get_context(&self, args: &Value) -> Result<Context, OpsError>;
}
