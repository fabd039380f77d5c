//! # opsrun
//!
//! The policy-and-secrets core of an operator-facing automation server.
//!
//! Given a declared set of named capabilities (intent → runbook bindings,
//! each active only under certain runtime conditions) and configuration
//! values that may reference externally-held secrets, this crate:
//!
//! - decides which capability, if any, satisfies a requested intent under
//!   the current execution context ([`capabilities`]);
//! - materializes secret-bearing configuration without ever mutating the
//!   original structure ([`secrets`]);
//! - constrains all filesystem path resolution to a sandbox root, defeating
//!   traversal and symlink-escape attacks ([`sandbox`]).
//!
//! Storage, transport, scheduling, and audit logging live in outer layers
//! and reach this crate through the collaborator traits
//! ([`CapabilityStore`], [`ContextProvider`], [`VaultClient`],
//! [`ProfileStore`], [`ProjectResolver`]).

pub mod capabilities;
pub mod context;
pub mod error;
pub mod sandbox;
pub mod secrets;

pub use capabilities::{
    Capability, CapabilityEffects, CapabilityInputs, CapabilityNode, CapabilityResolver,
    CapabilityStore, CapabilitySummary, EffectKind, MemoryCapabilityStore, ResolvedCapability,
    WhenClause,
};
pub use context::{Context, ContextProvider};
pub use error::{ErrorCode, OpsError};
pub use secrets::{
    EnvSource, ProfileStore, ProjectResolver, ResolveArgs, SecretRef, SecretResolver, VaultClient,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
