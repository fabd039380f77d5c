//! Capability resolution: which capability, if any, satisfies an intent
//! under the current execution context.

use std::sync::Arc;

use serde_json::Value;

use super::capability::{Capability, CapabilityNode, CapabilitySummary};
use super::when;
use crate::context::{Context, ContextProvider};
use crate::error::OpsError;

/// The outcome of a successful resolution: the winning capability plus the
/// context it was matched against, so callers can audit why it matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCapability {
    pub capability: Capability,
    pub context: Context,
}

/// Selects capabilities for intents. Candidates come from an external
/// [`CapabilityStore`](super::CapabilityStore); the context comes from an
/// external [`ContextProvider`].
pub struct CapabilityResolver {
    store: Arc<dyn super::CapabilityStore>,
    contexts: Arc<dyn ContextProvider>,
}

impl CapabilityResolver {
    pub fn new(store: Arc<dyn super::CapabilityStore>, contexts: Arc<dyn ContextProvider>) -> Self {
        Self { store, contexts }
    }

    /// Resolve `intent` to the single best-matching capability.
    ///
    /// Fails with [`OpsError::CapabilityNotFound`] when nothing is stored
    /// for the intent, and with the distinct [`OpsError::WhenNoMatch`] when
    /// candidates exist but none is active under the current context.
    /// Among matches, a capability named exactly like the intent wins over
    /// generic bindings; ties break lexicographically by name.
    pub async fn resolve(&self, intent: &str, args: &Value) -> Result<ResolvedCapability, OpsError> {
        if intent.trim().is_empty() {
            return Err(OpsError::invalid("intent", "intent is required"));
        }

        let candidates = self.store.find_all_by_intent(intent).await?;
        if candidates.is_empty() {
            return Err(OpsError::CapabilityNotFound {
                intent: intent.to_string(),
            });
        }

        let mut context = self.contexts.get_context(args).await?;
        let mut cache = context.files.clone();

        let mut matched = Vec::new();
        for capability in candidates {
            if when::matches(capability.when.as_ref(), &context, &mut cache).await {
                matched.push(capability);
            }
        }
        context.files = cache;

        if matched.is_empty() {
            return Err(OpsError::WhenNoMatch {
                intent: intent.to_string(),
            });
        }

        matched.sort_by(|a, b| {
            let a_exact = a.name == intent;
            let b_exact = b.name == intent;
            b_exact.cmp(&a_exact).then_with(|| a.name.cmp(&b.name))
        });

        Ok(ResolvedCapability {
            capability: matched.swap_remove(0),
            context,
        })
    }

    /// Every stored capability active under the supplied context, projected
    /// to summaries (runbook bodies are not exposed). A failing context
    /// provider degrades to an empty context rather than aborting: whens
    /// that need tags or files then simply don't match.
    pub async fn suggest(&self, args: &Value) -> Result<Vec<CapabilitySummary>, OpsError> {
        let capabilities = self.store.list_capabilities().await?;

        let context = match self.contexts.get_context(args).await {
            Ok(context) => context,
            Err(err) => {
                tracing::debug!(error = %err, "no context available, suggesting against an empty one");
                Context::default()
            }
        };
        let mut cache = context.files.clone();

        let mut summaries = Vec::new();
        for capability in &capabilities {
            if when::matches(capability.when.as_ref(), &context, &mut cache).await {
                summaries.push(capability.summary());
            }
        }
        Ok(summaries)
    }

    /// The dependency graph view: every stored capability as
    /// `{name, depends_on, intent}`. No cycle detection is performed here.
    pub async fn graph(&self) -> Result<Vec<CapabilityNode>, OpsError> {
        let capabilities = self.store.list_capabilities().await?;
        Ok(capabilities.iter().map(Capability::node).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::store::{CapabilityStore, MemoryCapabilityStore};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedContext(Context);

    #[async_trait]
    impl ContextProvider for FixedContext {
        async fn get_context(&self, _args: &Value) -> Result<Context, OpsError> {
            Ok(self.0.clone())
        }
    }

    struct FailingContext;

    #[async_trait]
    impl ContextProvider for FailingContext {
        async fn get_context(&self, _args: &Value) -> Result<Context, OpsError> {
            Err(OpsError::backend("context provider", "unreachable"))
        }
    }

    async fn store_with(entries: &[(&str, Value)]) -> Arc<MemoryCapabilityStore> {
        let store = Arc::new(MemoryCapabilityStore::new());
        for (name, body) in entries {
            store.set_capability(name, body).await.unwrap();
        }
        store
    }

    fn resolver(store: Arc<MemoryCapabilityStore>, context: Context) -> CapabilityResolver {
        CapabilityResolver::new(store, Arc::new(FixedContext(context)))
    }

    #[tokio::test]
    async fn missing_intent_is_not_found() {
        let resolver = resolver(store_with(&[]).await, Context::default());
        let err = resolver
            .resolve("missing-intent", &Value::Null)
            .await
            .unwrap_err();
        match err {
            OpsError::CapabilityNotFound { intent } => assert_eq!(intent, "missing-intent"),
            other => panic!("expected CapabilityNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inactive_candidates_are_a_distinct_failure() {
        let store = store_with(&[(
            "deploy",
            json!({"runbook": "r", "when": {"tags_all": ["prod"]}}),
        )])
        .await;
        let resolver = resolver(store, Context::new("dev"));
        let err = resolver.resolve("deploy", &Value::Null).await.unwrap_err();
        assert!(matches!(err, OpsError::WhenNoMatch { .. }));
    }

    #[tokio::test]
    async fn exact_name_wins_over_generic_binding() {
        let store = store_with(&[
            ("deploy-generic", json!({"runbook": "a", "intent": "deploy"})),
            ("deploy", json!({"runbook": "b"})),
        ])
        .await;
        let resolver = resolver(store, Context::default());
        let resolved = resolver.resolve("deploy", &Value::Null).await.unwrap();
        assert_eq!(resolved.capability.name, "deploy");
    }

    #[tokio::test]
    async fn name_breaks_ties_lexicographically() {
        let store = store_with(&[
            ("b", json!({"runbook": "rb", "intent": "deploy"})),
            ("a", json!({"runbook": "ra", "intent": "deploy"})),
        ])
        .await;
        let resolver = resolver(store, Context::default());
        let resolved = resolver.resolve("deploy", &Value::Null).await.unwrap();
        assert_eq!(resolved.capability.name, "a");
    }

    #[tokio::test]
    async fn when_filtering_uses_the_context() {
        let store = store_with(&[
            (
                "deploy-prod",
                json!({"runbook": "a", "intent": "deploy", "when": {"tags_all": ["prod"]}}),
            ),
            (
                "deploy-dev",
                json!({"runbook": "b", "intent": "deploy", "when": {"tags_all": ["dev"]}}),
            ),
        ])
        .await;
        let resolver = resolver(store, Context::new("dev").with_tag("dev"));
        let resolved = resolver.resolve("deploy", &Value::Null).await.unwrap();
        assert_eq!(resolved.capability.name, "deploy-dev");
        // The audited context comes back with the resolution.
        assert_eq!(resolved.context.key, "dev");
    }

    #[tokio::test]
    async fn suggest_projects_matching_capabilities() {
        let store = store_with(&[
            ("status", json!({"runbook": "s", "effects": {"kind": "read"}})),
            (
                "deploy",
                json!({"runbook": "d", "when": {"tags_all": ["prod"]}}),
            ),
        ])
        .await;
        let resolver = resolver(store, Context::new("dev"));
        let summaries = resolver.suggest(&Value::Null).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "status");
    }

    #[tokio::test]
    async fn suggest_survives_a_failing_context_provider() {
        let store = store_with(&[
            ("status", json!({"runbook": "s"})),
            (
                "deploy",
                json!({"runbook": "d", "when": {"tags_all": ["prod"]}}),
            ),
        ])
        .await;
        let resolver = CapabilityResolver::new(store, Arc::new(FailingContext));
        let summaries = resolver.suggest(&Value::Null).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "status");
    }

    #[tokio::test]
    async fn resolve_propagates_context_provider_failure() {
        let store = store_with(&[("deploy", json!({"runbook": "d"}))]).await;
        let resolver = CapabilityResolver::new(store, Arc::new(FailingContext));
        let err = resolver.resolve("deploy", &Value::Null).await.unwrap_err();
        assert!(matches!(err, OpsError::Backend { .. }));
    }

    #[tokio::test]
    async fn graph_projects_dependencies() {
        let store = store_with(&[
            (
                "deploy",
                json!({"runbook": "d", "depends_on": ["build", "test"]}),
            ),
            ("build", json!({"runbook": "b"})),
        ])
        .await;
        let resolver = resolver(store, Context::default());
        let mut nodes = resolver.graph().await.unwrap();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].name, "deploy");
        assert_eq!(nodes[1].depends_on, vec!["build", "test"]);
        assert_eq!(nodes[1].intent, "deploy");
    }
}
