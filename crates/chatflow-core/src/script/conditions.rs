//! Builtin condition handlers and combinators.
//!
//! Covers the common guards a script needs without custom code: the trivial
//! [`Always`]/[`Never`] guards, payload matching with [`ExactMatch`], and
//! the [`Not`]/[`All`]/[`Any`] combinators for composing registered
//! handlers.

use crate::cache::TurnCache;
use crate::context::Context;
use crate::error::Result;
use crate::script::graph::ScriptGraph;
use crate::script::handler::{ConditionHandler, HandlerRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Matches every input.
pub struct Always;

#[async_trait]
impl ConditionHandler for Always {
    async fn check(
        &self,
        _ctx: &Context,
        _graph: &ScriptGraph,
        _input: &Value,
        _cache: &TurnCache,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// Matches no input.
pub struct Never;

#[async_trait]
impl ConditionHandler for Never {
    async fn check(
        &self,
        _ctx: &Context,
        _graph: &ScriptGraph,
        _input: &Value,
        _cache: &TurnCache,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Matches when the inbound payload equals the expected value.
pub struct ExactMatch {
    expected: Value,
}

impl ExactMatch {
    pub fn new(expected: Value) -> Self {
        Self { expected }
    }
}

#[async_trait]
impl ConditionHandler for ExactMatch {
    async fn check(
        &self,
        _ctx: &Context,
        _graph: &ScriptGraph,
        input: &Value,
        _cache: &TurnCache,
    ) -> Result<bool> {
        Ok(input == &self.expected)
    }
}

/// Inverts an inner condition.
pub struct Not {
    inner: Arc<dyn ConditionHandler>,
}

impl Not {
    pub fn new(inner: Arc<dyn ConditionHandler>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ConditionHandler for Not {
    async fn check(
        &self,
        ctx: &Context,
        graph: &ScriptGraph,
        input: &Value,
        cache: &TurnCache,
    ) -> Result<bool> {
        Ok(!self.inner.check(ctx, graph, input, cache).await?)
    }
}

/// Matches when every inner condition matches. Short-circuits on the first
/// non-match; inner errors propagate (and are then treated as a non-match
/// by the pipeline).
pub struct All {
    inner: Vec<Arc<dyn ConditionHandler>>,
}

impl All {
    pub fn new(inner: Vec<Arc<dyn ConditionHandler>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ConditionHandler for All {
    async fn check(
        &self,
        ctx: &Context,
        graph: &ScriptGraph,
        input: &Value,
        cache: &TurnCache,
    ) -> Result<bool> {
        for condition in &self.inner {
            if !condition.check(ctx, graph, input, cache).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Matches when any inner condition matches. Short-circuits on the first
/// match.
pub struct Any {
    inner: Vec<Arc<dyn ConditionHandler>>,
}

impl Any {
    pub fn new(inner: Vec<Arc<dyn ConditionHandler>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ConditionHandler for Any {
    async fn check(
        &self,
        ctx: &Context,
        graph: &ScriptGraph,
        input: &Value,
        cache: &TurnCache,
    ) -> Result<bool> {
        for condition in &self.inner {
            if condition.check(ctx, graph, input, cache).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Registers the parameterless builtins (`always`, `never`) under their
/// canonical names. Parameterized conditions (`ExactMatch`, combinators)
/// are registered by script authors under names of their choosing.
pub fn register_builtin_conditions(registry: &mut HandlerRegistry) {
    registry.register_condition("always", Always);
    registry.register_condition("never", Never);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeAddress;
    use crate::script::source::{FlowSource, NodeSource, ScriptSource};
    use serde_json::json;

    fn graph() -> ScriptGraph {
        let mut registry = HandlerRegistry::new();
        register_builtin_conditions(&mut registry);
        registry.register_response_fn("echo", |_, input| input.clone());
        let source = ScriptSource::new(NodeAddress::new("f", "a"), NodeAddress::new("f", "a"))
            .with_flow(FlowSource::new("f").with_node(NodeSource::new("a", "echo")));
        ScriptGraph::build(&source, &registry).unwrap()
    }

    async fn check(handler: &dyn ConditionHandler, input: Value) -> bool {
        let ctx = Context::fresh("u1", NodeAddress::new("f", "a"));
        let cache = TurnCache::new();
        handler.check(&ctx, &graph(), &input, &cache).await.unwrap()
    }

    #[tokio::test]
    async fn test_always_and_never() {
        assert!(check(&Always, json!("anything")).await);
        assert!(!check(&Never, json!("anything")).await);
    }

    #[tokio::test]
    async fn test_exact_match() {
        let handler = ExactMatch::new(json!("hi"));
        assert!(check(&handler, json!("hi")).await);
        assert!(!check(&handler, json!("bye")).await);
    }

    #[tokio::test]
    async fn test_not_inverts() {
        let handler = Not::new(Arc::new(Never));
        assert!(check(&handler, json!("x")).await);
    }

    #[tokio::test]
    async fn test_all_and_any() {
        let all = All::new(vec![Arc::new(Always), Arc::new(Never)]);
        assert!(!check(&all, json!("x")).await);

        let any = Any::new(vec![Arc::new(Never), Arc::new(Always)]);
        assert!(check(&any, json!("x")).await);
    }
}
