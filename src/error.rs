//! Crate-wide error type with stable machine-readable codes.
//!
//! Every failure surfaced by this crate maps onto one of four codes:
//! `invalid_params`, `not_found`, `denied`, `internal`. Callers dispatch on
//! [`OpsError::code`]; the variant itself carries the diagnostic detail
//! (intent, name, scheme, path) needed to self-correct.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed input, locally detectable before any I/O.
    InvalidParams,
    /// The referenced thing does not exist. Expected and recoverable.
    NotFound,
    /// A security-relevant rejection, e.g. a sandbox escape attempt.
    Denied,
    /// Server misconfiguration or collaborator failure. Fix the deployment,
    /// not the request.
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::NotFound => "not_found",
            Self::Denied => "denied",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by capability resolution, secret resolution, and sandbox
/// path resolution.
#[derive(Debug, Error)]
pub enum OpsError {
    /// A field failed validation. `field` scopes the error to the offending
    /// part of the input.
    #[error("invalid {field}: {message}")]
    InvalidParams { field: String, message: String },

    /// No capability is stored for the requested intent.
    #[error("no capability found for intent '{intent}'")]
    CapabilityNotFound { intent: String },

    /// Capabilities exist for the intent, but none is active under the
    /// current context. Distinct from [`OpsError::CapabilityNotFound`]
    /// because callers react differently.
    #[error("capabilities exist for intent '{intent}' but none match the current context")]
    WhenNoMatch { intent: String },

    /// A capability referenced by name does not exist.
    #[error("capability '{name}' not found")]
    NameNotFound { name: String },

    /// A path does not exist where one was required.
    #[error("path '{path}' not found")]
    PathNotFound { path: String },

    /// A candidate path resolved outside the sandbox root.
    #[error("path '{path}' escapes the sandbox root")]
    SandboxEscape { path: String },

    /// A secret reference used a scheme this crate does not recognize.
    #[error("unknown secret ref scheme '{scheme}'")]
    UnknownRefScheme { scheme: String },

    /// `ref:env:` with a blank variable name.
    #[error("secret ref 'env:' requires a variable name")]
    EmptyEnvRefName,

    /// `ref:env:<NAME>` where NAME is not set. Secret absence never
    /// degrades to an empty value.
    #[error("environment variable '{name}' is not set")]
    UnsetEnvVar { name: String },

    /// A `ref:vault:kv2:` reference was hit but no vault client is wired up.
    #[error("no vault client is configured")]
    VaultNotConfigured,

    /// Vault profile inference found nothing to infer from.
    #[error("a vault profile is required, none exist")]
    NoVaultProfiles,

    /// Multiple vault profiles exist and the caller selected none.
    #[error("a vault profile is required when multiple exist")]
    AmbiguousVaultProfile,

    /// A collaborator (store, vault client, context provider) failed.
    #[error("{collaborator} failed: {message}")]
    Backend {
        collaborator: &'static str,
        message: String,
    },

    /// Filesystem error during path resolution.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OpsError {
    /// Field-scoped validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Collaborator failure, reported as `internal`.
    pub fn backend(collaborator: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Backend {
            collaborator,
            message: message.to_string(),
        }
    }

    /// The stable machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParams { .. } | Self::UnknownRefScheme { .. } | Self::EmptyEnvRefName => {
                ErrorCode::InvalidParams
            }
            Self::CapabilityNotFound { .. }
            | Self::WhenNoMatch { .. }
            | Self::NameNotFound { .. }
            | Self::PathNotFound { .. }
            | Self::UnsetEnvVar { .. } => ErrorCode::NotFound,
            Self::SandboxEscape { .. } => ErrorCode::Denied,
            Self::VaultNotConfigured
            | Self::NoVaultProfiles
            | Self::AmbiguousVaultProfile
            | Self::Backend { .. }
            | Self::Io(_) => ErrorCode::Internal,
        }
    }

    /// A remediation hint for conditions the caller can fix, where one
    /// exists.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CapabilityNotFound { .. } => Some("create a capability for this intent"),
            Self::WhenNoMatch { .. } => {
                Some("adjust the context or the capability's when-clause")
            }
            Self::AmbiguousVaultProfile => Some("pass vault_profile_name to select one"),
            Self::NoVaultProfiles => Some("register a vault profile first"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(ErrorCode::InvalidParams.as_str(), "invalid_params");
        assert_eq!(ErrorCode::NotFound.as_str(), "not_found");
        assert_eq!(ErrorCode::Denied.as_str(), "denied");
        assert_eq!(ErrorCode::Internal.as_str(), "internal");
    }

    #[test]
    fn variants_map_to_expected_codes() {
        let not_found = OpsError::CapabilityNotFound {
            intent: "deploy".into(),
        };
        assert_eq!(not_found.code(), ErrorCode::NotFound);
        assert!(not_found.to_string().contains("deploy"));

        let denied = OpsError::SandboxEscape {
            path: "../../etc/passwd".into(),
        };
        assert_eq!(denied.code(), ErrorCode::Denied);

        assert_eq!(
            OpsError::UnknownRefScheme {
                scheme: "weird".into()
            }
            .code(),
            ErrorCode::InvalidParams
        );
        assert_eq!(OpsError::VaultNotConfigured.code(), ErrorCode::Internal);
        assert_eq!(
            OpsError::UnsetEnvVar { name: "FOO".into() }.code(),
            ErrorCode::NotFound
        );
    }

    #[test]
    fn remediable_conditions_carry_hints() {
        let err = OpsError::CapabilityNotFound {
            intent: "deploy".into(),
        };
        assert_eq!(err.hint(), Some("create a capability for this intent"));
        assert!(OpsError::EmptyEnvRefName.hint().is_none());
    }
}
