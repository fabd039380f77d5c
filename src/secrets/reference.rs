//! The secret reference grammar.
//!
//! A secret reference is a string of the exact form
//! `ref:<scheme>:<rest>`. Two schemes are recognized:
//!
//! - `ref:vault:kv2:<path>` — read from a vault KV v2 mount
//! - `ref:env:<VAR_NAME>` — read from the process environment
//!
//! Dispatch is a closed enumeration: an unrecognized scheme is a resolution
//! error naming the offending scheme, never a silent pass-through.

use crate::error::OpsError;

/// The marker every secret reference starts with.
pub const REF_PREFIX: &str = "ref:";

/// A parsed secret reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    /// A vault KV v2 read. The path is opaque to this crate and passed to
    /// the vault client verbatim (including any `#key` fragment).
    VaultKv2 { path: String },
    /// A process-environment read.
    Env { name: String },
}

impl SecretRef {
    /// Whether a string leaf is even a candidate for resolution.
    pub fn is_ref(value: &str) -> bool {
        value.starts_with(REF_PREFIX)
    }

    /// Parse a full reference string, e.g. `ref:env:DB_PASSWORD`.
    pub fn parse(raw: &str) -> Result<SecretRef, OpsError> {
        let body = raw.strip_prefix(REF_PREFIX).ok_or_else(|| {
            OpsError::invalid("ref", format!("'{raw}' is not a secret reference"))
        })?;

        let (scheme, rest) = match body.split_once(':') {
            Some(parts) => parts,
            None => (body, ""),
        };

        match scheme {
            "vault" => {
                let path = rest.strip_prefix("kv2:").ok_or_else(|| {
                    OpsError::invalid("ref", "vault references must use the kv2 engine")
                })?;
                if path.is_empty() {
                    return Err(OpsError::invalid("ref", "vault reference path is empty"));
                }
                Ok(SecretRef::VaultKv2 {
                    path: path.to_string(),
                })
            }
            "env" => {
                let name = rest.trim();
                if name.is_empty() {
                    return Err(OpsError::EmptyEnvRefName);
                }
                Ok(SecretRef::Env {
                    name: name.to_string(),
                })
            }
            other => Err(OpsError::UnknownRefScheme {
                scheme: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn parses_vault_kv2() {
        let parsed = SecretRef::parse("ref:vault:kv2:ops/db#password").unwrap();
        assert_eq!(
            parsed,
            SecretRef::VaultKv2 {
                path: "ops/db#password".into()
            }
        );
    }

    #[test]
    fn parses_env_and_trims_the_name() {
        let parsed = SecretRef::parse("ref:env: DB_PASSWORD ").unwrap();
        assert_eq!(
            parsed,
            SecretRef::Env {
                name: "DB_PASSWORD".into()
            }
        );
    }

    #[test]
    fn empty_env_name_is_an_error() {
        let err = SecretRef::parse("ref:env:").unwrap_err();
        assert!(matches!(err, OpsError::EmptyEnvRefName));
        let err = SecretRef::parse("ref:env:   ").unwrap_err();
        assert!(matches!(err, OpsError::EmptyEnvRefName));
    }

    #[test]
    fn unknown_scheme_names_the_scheme() {
        let err = SecretRef::parse("ref:weird:x").unwrap_err();
        match err {
            OpsError::UnknownRefScheme { scheme } => assert_eq!(scheme, "weird"),
            other => panic!("expected UnknownRefScheme, got {other:?}"),
        }
    }

    #[test]
    fn non_kv2_vault_engine_is_rejected() {
        let err = SecretRef::parse("ref:vault:kv1:ops/db").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParams);
    }

    #[test]
    fn is_ref_only_matches_the_prefix() {
        assert!(SecretRef::is_ref("ref:env:FOO"));
        assert!(!SecretRef::is_ref("plain value"));
        assert!(!SecretRef::is_ref("reference"));
    }
}
