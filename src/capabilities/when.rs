//! When-clauses: the declarative predicate language gating capability
//! activation.
//!
//! A when-clause is a recursive tree of optional fields. All present fields
//! AND together; an absent field imposes no constraint; a present-but-empty
//! list is vacuously true, matching the absent-constraint convention.
//! Evaluation order is fixed (`all_of`, `any_of`, `not`, tags, files) and
//! short-circuits, so file probes only happen when the cheaper tag checks
//! pass.
//!
//! File checks resolve each listed path against `context.root` through the
//! sandbox resolver and are cached per evaluation tree, keyed by the literal
//! path string.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::sandbox;

/// File-existence cache threaded through one `matches` evaluation tree.
/// Created fresh per call; concurrent evaluations never share one.
pub type FileExistsCache = HashMap<String, bool>;

/// A recursive boolean predicate over context tags and file existence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhenClause {
    /// Every sub-clause must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<WhenClause>>,

    /// At least one sub-clause must match, if the list is non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<WhenClause>>,

    /// Fails if the nested clause matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<WhenClause>>,

    /// Context must hold at least one of these tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags_any: Option<Vec<String>>,

    /// Context must hold every one of these tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags_all: Option<Vec<String>>,

    /// At least one of these paths must exist under the context root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_any: Option<Vec<String>>,

    /// All of these paths must exist under the context root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_all: Option<Vec<String>>,
}

/// Does `when` activate under `context`? An absent clause always matches.
/// Never fails: evaluation has no error path, only a boolean outcome.
pub async fn matches(
    when: Option<&WhenClause>,
    context: &Context,
    cache: &mut FileExistsCache,
) -> bool {
    match when {
        None => true,
        Some(clause) => clause.eval(context, cache).await,
    }
}

/// Raw-JSON entry point for when-clauses that arrive untyped. A value that
/// is present but not an object-shaped predicate tree fails closed.
pub async fn matches_value(
    when: Option<&Value>,
    context: &Context,
    cache: &mut FileExistsCache,
) -> bool {
    match when {
        None | Some(Value::Null) => true,
        Some(value @ Value::Object(_)) => match serde_json::from_value::<WhenClause>(value.clone())
        {
            Ok(clause) => clause.eval(context, cache).await,
            Err(_) => false,
        },
        Some(_) => false,
    }
}

impl WhenClause {
    /// True when no field is present, i.e. the clause imposes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn eval<'a>(
        &'a self,
        context: &'a Context,
        cache: &'a mut FileExistsCache,
    ) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            if let Some(all) = &self.all_of {
                for clause in all {
                    if !clause.eval(context, &mut *cache).await {
                        return false;
                    }
                }
            }

            if let Some(any) = &self.any_of {
                if !any.is_empty() {
                    let mut hit = false;
                    for clause in any {
                        if clause.eval(context, &mut *cache).await {
                            hit = true;
                            break;
                        }
                    }
                    if !hit {
                        return false;
                    }
                }
            }

            if let Some(not) = &self.not {
                if not.eval(context, &mut *cache).await {
                    return false;
                }
            }

            if let Some(tags) = &self.tags_any {
                if !tags.is_empty() && !tags.iter().any(|t| context.has_tag(t)) {
                    return false;
                }
            }

            if let Some(tags) = &self.tags_all {
                if !tags.iter().all(|t| context.has_tag(t)) {
                    return false;
                }
            }

            if let Some(files) = &self.files_any {
                if !files.is_empty() {
                    let mut hit = false;
                    for path in files {
                        if file_exists(context, path, &mut *cache).await {
                            hit = true;
                            break;
                        }
                    }
                    if !hit {
                        return false;
                    }
                }
            }

            if let Some(files) = &self.files_all {
                for path in files {
                    if !file_exists(context, path, &mut *cache).await {
                        return false;
                    }
                }
            }

            true
        })
    }
}

async fn file_exists(context: &Context, path: &str, cache: &mut FileExistsCache) -> bool {
    if let Some(hit) = cache.get(path) {
        return *hit;
    }
    let exists = match &context.root {
        Some(root) => sandbox::exists_in_root(root, path).await,
        None => false,
    };
    cache.insert(path.to_string(), exists);
    exists
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with_tags(tags: &[&str]) -> Context {
        let mut ctx = Context::new("test");
        for tag in tags {
            ctx = ctx.with_tag(*tag);
        }
        ctx
    }

    async fn eval(when: &WhenClause, ctx: &Context) -> bool {
        let mut cache = FileExistsCache::new();
        matches(Some(when), ctx, &mut cache).await
    }

    #[tokio::test]
    async fn absent_clause_always_matches() {
        let mut cache = FileExistsCache::new();
        assert!(matches(None, &Context::default(), &mut cache).await);
    }

    #[tokio::test]
    async fn empty_clause_matches() {
        assert!(eval(&WhenClause::default(), &Context::default()).await);
        assert!(WhenClause::default().is_empty());
    }

    #[tokio::test]
    async fn tags_all_requires_every_tag() {
        let when = WhenClause {
            tags_all: Some(vec!["linux".into(), "prod".into()]),
            ..Default::default()
        };
        assert!(!eval(&when, &ctx_with_tags(&["linux"])).await);
        assert!(eval(&when, &ctx_with_tags(&["linux", "prod"])).await);
    }

    #[tokio::test]
    async fn tags_any_requires_at_least_one() {
        let when = WhenClause {
            tags_any: Some(vec!["linux".into(), "macos".into()]),
            ..Default::default()
        };
        assert!(eval(&when, &ctx_with_tags(&["macos"])).await);
        assert!(!eval(&when, &ctx_with_tags(&["windows"])).await);
    }

    #[tokio::test]
    async fn empty_lists_are_vacuously_true() {
        let when = WhenClause {
            tags_any: Some(vec![]),
            tags_all: Some(vec![]),
            files_any: Some(vec![]),
            files_all: Some(vec![]),
            any_of: Some(vec![]),
            ..Default::default()
        };
        assert!(eval(&when, &Context::default()).await);
    }

    #[tokio::test]
    async fn not_inverts() {
        let when = WhenClause {
            not: Some(Box::new(WhenClause {
                tags_any: Some(vec!["prod".into()]),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert!(eval(&when, &ctx_with_tags(&["dev"])).await);
        assert!(!eval(&when, &ctx_with_tags(&["prod"])).await);
    }

    #[tokio::test]
    async fn all_of_and_any_of_compose() {
        let tag = |t: &str| WhenClause {
            tags_all: Some(vec![t.into()]),
            ..Default::default()
        };
        let when = WhenClause {
            all_of: Some(vec![tag("linux")]),
            any_of: Some(vec![tag("staging"), tag("prod")]),
            ..Default::default()
        };
        assert!(eval(&when, &ctx_with_tags(&["linux", "prod"])).await);
        assert!(!eval(&when, &ctx_with_tags(&["linux"])).await);
        assert!(!eval(&when, &ctx_with_tags(&["prod"])).await);
    }

    #[tokio::test]
    async fn file_checks_use_the_context_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), b"[package]").unwrap();
        let ctx = Context::new("local").with_root(dir.path());

        let when = WhenClause {
            files_all: Some(vec!["Cargo.toml".into()]),
            ..Default::default()
        };
        assert!(eval(&when, &ctx).await);

        let missing = WhenClause {
            files_all: Some(vec!["Cargo.toml".into(), "missing".into()]),
            ..Default::default()
        };
        assert!(!eval(&missing, &ctx).await);
    }

    #[tokio::test]
    async fn file_checks_without_root_never_match() {
        let when = WhenClause {
            files_any: Some(vec!["Cargo.toml".into()]),
            ..Default::default()
        };
        assert!(!eval(&when, &Context::default()).await);
    }

    #[tokio::test]
    async fn seeded_cache_is_trusted_over_the_filesystem() {
        let when = WhenClause {
            files_all: Some(vec!["virtual.lock".into()]),
            ..Default::default()
        };
        let ctx = Context::default();
        let mut cache = FileExistsCache::from([("virtual.lock".to_string(), true)]);
        assert!(matches(Some(&when), &ctx, &mut cache).await);
    }

    #[tokio::test]
    async fn repeated_paths_hit_the_cache_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), b"").unwrap();
        let ctx = Context::new("local").with_root(dir.path());

        let when = WhenClause {
            files_any: Some(vec!["marker".into()]),
            files_all: Some(vec!["marker".into()]),
            ..Default::default()
        };
        let mut cache = FileExistsCache::new();
        assert!(matches(Some(&when), &ctx, &mut cache).await);
        assert_eq!(cache.get("marker"), Some(&true));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn raw_values_fail_closed() {
        let ctx = Context::default();
        let mut cache = FileExistsCache::new();
        assert!(matches_value(None, &ctx, &mut cache).await);
        assert!(matches_value(Some(&Value::Null), &ctx, &mut cache).await);
        assert!(matches_value(Some(&json!({})), &ctx, &mut cache).await);
        // Not object-shaped: non-match, not an error.
        assert!(!matches_value(Some(&json!("always")), &ctx, &mut cache).await);
        assert!(!matches_value(Some(&json!(42)), &ctx, &mut cache).await);
        // Object-shaped but malformed field types: also fail closed.
        assert!(!matches_value(Some(&json!({"tags_any": "linux"})), &ctx, &mut cache).await);
    }
}
