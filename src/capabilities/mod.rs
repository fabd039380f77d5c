//! Capabilities: declarative intent → runbook bindings, gated by
//! when-clauses and resolved against execution contexts.

pub mod capability;
pub mod resolver;
pub mod store;
pub mod when;

pub use capability::{
    Capability, CapabilityEffects, CapabilityInputs, CapabilityNode, CapabilitySummary, EffectKind,
};
pub use resolver::{CapabilityResolver, ResolvedCapability};
pub use store::{CapabilityStore, MemoryCapabilityStore};
pub use when::{matches, matches_value, FileExistsCache, WhenClause};
