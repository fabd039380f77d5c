//! Secret-bearing configuration: reference grammar, backend seams, and the
//! deep non-mutating resolver.

pub mod backends;
pub mod reference;
pub mod resolver;

pub use backends::{
    EnvSource, ProfileRecord, ProfileStore, ProjectContext, ProjectResolver, ProjectTarget,
    VaultClient,
};
pub use reference::{SecretRef, REF_PREFIX};
pub use resolver::{RefCache, ResolveArgs, SecretResolver};
