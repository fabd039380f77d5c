//! Deep secret-reference resolution over arbitrary configuration values.
//!
//! [`SecretResolver::resolve_deep`] walks a JSON-shaped value tree and
//! replaces every string leaf matching the secret reference grammar with its
//! resolved value. The walk builds a fresh structure at every level — the
//! input is never mutated — and memoizes resolved references in a per-call
//! cache so repeated identical references cost one backend call.
//!
//! It is safe to run the resolver over an entire configuration object;
//! non-reference leaves pass through unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backends::{EnvSource, ProfileStore, ProjectResolver, VaultClient};
use super::reference::{SecretRef, REF_PREFIX};
use crate::error::OpsError;

/// Caller-supplied arguments steering one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveArgs {
    /// Explicit vault profile selection, highest priority.
    pub vault_profile_name: Option<String>,

    /// Legacy alternate key for explicit selection.
    pub vault_profile: Option<String>,

    /// Bound on each vault read, forwarded to the client.
    pub timeout_ms: Option<u64>,

    /// Arguments forwarded to the best-effort project-context lookup.
    #[serde(skip)]
    pub project_args: Value,
}

impl ResolveArgs {
    /// Pick the steering keys out of a JSON argument object. Unknown keys
    /// are ignored; the whole object is kept for the project lookup.
    pub fn from_value(args: &Value) -> Self {
        let mut parsed: ResolveArgs =
            serde_json::from_value(args.clone()).unwrap_or_default();
        parsed.project_args = args.clone();
        parsed
    }
}

/// Per-call memoization of resolved references, keyed by the literal
/// reference string. Created fresh inside `resolve_deep` and discarded when
/// it returns; there is no cross-call memoization.
pub type RefCache = HashMap<String, String>;

/// Resolves secret references against configured backends.
#[derive(Default)]
pub struct SecretResolver {
    vault: Option<Arc<dyn VaultClient>>,
    profiles: Option<Arc<dyn ProfileStore>>,
    project: Option<Arc<dyn ProjectResolver>>,
    env: EnvSource,
}

impl SecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vault(mut self, vault: Arc<dyn VaultClient>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn with_project_resolver(mut self, project: Arc<dyn ProjectResolver>) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Return a copy of `value` with every secret reference replaced by its
    /// resolved value. The input is left untouched.
    pub async fn resolve_deep(&self, value: &Value, args: &ResolveArgs) -> Result<Value, OpsError> {
        let mut cache = RefCache::new();
        self.walk(value, args, &mut cache).await
    }

    fn walk<'a>(
        &'a self,
        value: &'a Value,
        args: &'a ResolveArgs,
        cache: &'a mut RefCache,
    ) -> BoxFuture<'a, Result<Value, OpsError>> {
        Box::pin(async move {
            match value {
                Value::String(s) if s.starts_with(REF_PREFIX) => Ok(Value::String(
                    self.resolve_ref_string(s, args, &mut *cache).await?,
                )),
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.walk(item, args, &mut *cache).await?);
                    }
                    Ok(Value::Array(out))
                }
                Value::Object(entries) => {
                    let mut out = serde_json::Map::with_capacity(entries.len());
                    for (key, entry) in entries {
                        out.insert(key.clone(), self.walk(entry, args, &mut *cache).await?);
                    }
                    Ok(Value::Object(out))
                }
                other => Ok(other.clone()),
            }
        })
    }

    /// Resolve one reference string through the matching backend.
    pub async fn resolve_ref_string(
        &self,
        raw: &str,
        args: &ResolveArgs,
        cache: &mut RefCache,
    ) -> Result<String, OpsError> {
        if let Some(hit) = cache.get(raw) {
            return Ok(hit.clone());
        }

        let resolved = match SecretRef::parse(raw)? {
            SecretRef::VaultKv2 { path } => {
                let vault = self.vault.as_ref().ok_or(OpsError::VaultNotConfigured)?;
                let profile = self.resolve_vault_profile_name(args).await?;
                vault.kv2_get(&profile, &path, args.timeout_ms).await?
            }
            SecretRef::Env { name } => self
                .env
                .get(&name)
                .ok_or(OpsError::UnsetEnvVar { name })?,
        };

        cache.insert(raw.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Decide which vault profile to use, in strict priority order:
    /// explicit `vault_profile_name`, legacy `vault_profile`, the project
    /// target's profile (best-effort), then inference when exactly one
    /// profile is registered. Ambiguity is never guessed away.
    pub async fn resolve_vault_profile_name(&self, args: &ResolveArgs) -> Result<String, OpsError> {
        if let Some(name) = non_empty(args.vault_profile_name.as_deref()) {
            return Ok(name);
        }
        if let Some(name) = non_empty(args.vault_profile.as_deref()) {
            return Ok(name);
        }

        if let Some(project) = &self.project {
            match project.resolve_context(&args.project_args).await {
                Ok(context) => {
                    if let Some(name) = non_empty(context.target.vault_profile.as_deref()) {
                        return Ok(name);
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "project context lookup failed, ignoring");
                }
            }
        }

        let profiles = match &self.profiles {
            Some(store) => store.list_profiles("vault").await?,
            None => Vec::new(),
        };
        match profiles.len() {
            1 => Ok(profiles[0].name.clone()),
            0 => Err(OpsError::NoVaultProfiles),
            _ => Err(OpsError::AmbiguousVaultProfile),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
