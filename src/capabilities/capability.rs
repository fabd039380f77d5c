//! Capability definition — a named, conditionally-active binding from an
//! intent to a runbook.
//!
//! Capabilities are declarative records: the store owns their lifecycle and
//! this crate treats a resolved capability as an immutable value object.
//! `name` is the primary key; `intent` is not unique — several capabilities
//! may share an intent and are disambiguated by their when-clause.
//!
//! Example YAML:
//! ```yaml
//! capability:
//!   name: deploy-staging
//!   intent: deploy
//!   description: "Deploy the app to the staging cluster"
//!   runbook: "runbooks/deploy-staging.yaml"
//!   inputs:
//!     required: [version]
//!     defaults:
//!       cluster: staging
//!   effects:
//!     kind: write
//!   tags: [deploy, staging]
//!   when:
//!     tags_all: [staging]
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::when::WhenClause;
use crate::error::OpsError;

/// A declarative binding of an intent to a runbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Unique key within the store.
    pub name: String,

    /// The abstract operation this capability satisfies. Defaults to `name`.
    #[serde(default)]
    pub intent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Opaque pointer to the procedure this capability runs. Interpreted
    /// elsewhere, never by this crate.
    pub runbook: String,

    #[serde(default)]
    pub inputs: CapabilityInputs,

    #[serde(default)]
    pub effects: CapabilityEffects,

    /// Names of capabilities this one depends on. No cycle detection here;
    /// consumers of the graph view own that.
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Activation gate. Absence means the capability always matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenClause>,

    /// Provenance tag (e.g. "local"), set by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Normalized input declaration for a capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityInputs {
    /// Required input names, ordered and deduplicated.
    pub required: Vec<String>,

    /// Default values merged into missing inputs.
    pub defaults: HashMap<String, Value>,

    /// Input-name renames applied before the runbook sees the arguments.
    pub map: HashMap<String, String>,

    /// Whether unrecognized inputs flow through to the runbook.
    pub pass_through: bool,
}

/// What a capability does to the world, and whether it is gated behind an
/// explicit apply step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EffectsRaw")]
pub struct CapabilityEffects {
    pub kind: EffectKind,

    /// Defaults to true unless `kind` is `read`.
    pub requires_apply: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Read,
    Write,
    Mixed,
}

impl EffectKind {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl Default for CapabilityEffects {
    // Unspecified effects are assumed write-capable and kept behind apply.
    fn default() -> Self {
        Self {
            kind: EffectKind::Mixed,
            requires_apply: true,
        }
    }
}

#[derive(Deserialize)]
struct EffectsRaw {
    #[serde(default = "default_effect_kind")]
    kind: EffectKind,
    #[serde(default)]
    requires_apply: Option<bool>,
}

fn default_effect_kind() -> EffectKind {
    EffectKind::Mixed
}

impl From<EffectsRaw> for CapabilityEffects {
    fn from(raw: EffectsRaw) -> Self {
        Self {
            kind: raw.kind,
            requires_apply: raw.requires_apply.unwrap_or(raw.kind != EffectKind::Read),
        }
    }
}

/// The projection of a capability exposed by `suggest`. Deliberately omits
/// the runbook and input bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySummary {
    pub name: String,
    pub intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub effects: CapabilityEffects,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<&Capability> for CapabilitySummary {
    fn from(cap: &Capability) -> Self {
        Self {
            name: cap.name.clone(),
            intent: cap.intent.clone(),
            description: cap.description.clone(),
            effects: cap.effects.clone(),
            tags: cap.tags.clone(),
            when: cap.when.clone(),
            source: cap.source.clone(),
        }
    }
}

/// One node of the dependency graph view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityNode {
    pub name: String,
    pub depends_on: Vec<String>,
    pub intent: String,
}

impl Capability {
    /// Validate raw field values and build a normalized capability. Every
    /// rejection is scoped to the offending field so callers can
    /// self-correct before anything is persisted.
    ///
    /// `source` is deliberately not accepted from the input — provenance is
    /// the store's to assign.
    pub fn normalize(name: &str, value: &Value) -> Result<Capability, OpsError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OpsError::invalid("name", "capability name is required"));
        }
        let body = value
            .as_object()
            .ok_or_else(|| OpsError::invalid("capability", "capability must be an object"))?;

        let runbook = match body.get("runbook") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::String(_)) | None => {
                return Err(OpsError::invalid("runbook", "runbook is required"))
            }
            Some(_) => return Err(OpsError::invalid("runbook", "runbook must be a string")),
        };

        let intent = match body.get("intent") {
            None | Some(Value::Null) => name.to_string(),
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::String(_)) => name.to_string(),
            Some(_) => return Err(OpsError::invalid("intent", "intent must be a string")),
        };

        let description = match body.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(OpsError::invalid(
                    "description",
                    "description must be a string",
                ))
            }
        };

        let inputs = match body.get("inputs") {
            None | Some(Value::Null) => CapabilityInputs::default(),
            Some(value) => normalize_inputs(value)?,
        };

        let effects = match body.get("effects") {
            None | Some(Value::Null) => CapabilityEffects::default(),
            Some(value) => normalize_effects(value)?,
        };

        let depends_on = string_list(body.get("depends_on"), "depends_on")?;
        let tags = string_list(body.get("tags"), "tags")?;

        let when = match body.get("when") {
            None | Some(Value::Null) => None,
            Some(value @ Value::Object(_)) => {
                let clause: WhenClause = serde_json::from_value(value.clone())
                    .map_err(|err| OpsError::invalid("when", err.to_string()))?;
                Some(clause)
            }
            Some(_) => {
                return Err(OpsError::invalid(
                    "when",
                    "when must be an object-shaped predicate tree",
                ))
            }
        };

        Ok(Capability {
            name: name.to_string(),
            intent,
            description,
            runbook,
            inputs,
            effects,
            depends_on,
            tags,
            when,
            source: None,
        })
    }

    /// Parse a capability from a YAML document. The body may sit under a
    /// `capability:` envelope or at the top level.
    pub fn from_yaml(yaml: &str) -> Result<Capability, OpsError> {
        let doc: Value = serde_yaml::from_str(yaml)
            .map_err(|err| OpsError::invalid("yaml", err.to_string()))?;
        let body = doc.get("capability").unwrap_or(&doc);
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| OpsError::invalid("name", "capability name is required"))?
            .to_string();
        Self::normalize(&name, body)
    }

    /// Parse a capability from a YAML file on disk.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Capability, OpsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn summary(&self) -> CapabilitySummary {
        CapabilitySummary::from(self)
    }

    pub fn node(&self) -> CapabilityNode {
        CapabilityNode {
            name: self.name.clone(),
            depends_on: self.depends_on.clone(),
            intent: self.intent.clone(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn normalize_inputs(value: &Value) -> Result<CapabilityInputs, OpsError> {
    let body = value
        .as_object()
        .ok_or_else(|| OpsError::invalid("inputs", "inputs must be an object"))?;

    let mut required = Vec::new();
    for item in string_list(body.get("required"), "inputs.required")? {
        if !required.contains(&item) {
            required.push(item);
        }
    }

    let defaults = match body.get("defaults") {
        None | Some(Value::Null) => HashMap::new(),
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(_) => {
            return Err(OpsError::invalid(
                "inputs.defaults",
                "defaults must be an object",
            ))
        }
    };

    let map = match body.get("map") {
        None | Some(Value::Null) => HashMap::new(),
        Some(Value::Object(entries)) => {
            let mut out = HashMap::with_capacity(entries.len());
            for (key, target) in entries {
                let target = target.as_str().ok_or_else(|| {
                    OpsError::invalid("inputs.map", format!("mapping for '{key}' must be a string"))
                })?;
                out.insert(key.clone(), target.to_string());
            }
            out
        }
        Some(_) => return Err(OpsError::invalid("inputs.map", "map must be an object")),
    };

    let pass_through = match body.get("pass_through") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(OpsError::invalid(
                "inputs.pass_through",
                "pass_through must be a boolean",
            ))
        }
    };

    Ok(CapabilityInputs {
        required,
        defaults,
        map,
        pass_through,
    })
}

fn normalize_effects(value: &Value) -> Result<CapabilityEffects, OpsError> {
    let body = value
        .as_object()
        .ok_or_else(|| OpsError::invalid("effects", "effects must be an object"))?;

    let kind = match body.get("kind") {
        None | Some(Value::Null) => EffectKind::Mixed,
        Some(Value::String(token)) => EffectKind::parse(token).ok_or_else(|| {
            OpsError::invalid(
                "effects.kind",
                format!("'{token}' is not one of read, write, mixed"),
            )
        })?,
        Some(_) => {
            return Err(OpsError::invalid(
                "effects.kind",
                "kind must be one of read, write, mixed",
            ))
        }
    };

    let requires_apply = match body.get("requires_apply") {
        None | Some(Value::Null) => kind != EffectKind::Read,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(OpsError::invalid(
                "effects.requires_apply",
                "requires_apply must be a boolean",
            ))
        }
    };

    Ok(CapabilityEffects {
        kind,
        requires_apply,
    })
}

fn string_list(value: Option<&Value>, field: &str) -> Result<Vec<String>, OpsError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let s = item.as_str().ok_or_else(|| {
                    OpsError::invalid(field, "entries must be strings")
                })?;
                out.push(s.to_string());
            }
            Ok(out)
        }
        Some(_) => Err(OpsError::invalid(
            field,
            "must be an array of strings",
        )),
    }
}
