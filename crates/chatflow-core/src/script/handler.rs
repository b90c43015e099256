//! Condition/response handler contract and registry.
//!
//! Script authors supply behavior as named handlers implementing a closed
//! capability interface: one method, one uniform signature. Handlers are
//! registered by name before graph construction and resolved to `Arc`
//! references while the graph is built, so a running pipeline never performs
//! name lookups.
//!
//! Every invocation receives its [`Context`] and [`TurnCache`] as explicit
//! arguments; there is no ambient "current session" state, which is what
//! makes per-user parallelism safe.

use crate::cache::TurnCache;
use crate::context::Context;
use crate::error::Result;
use crate::script::graph::ScriptGraph;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A transition guard.
///
/// Implementations may be pure predicates or perform I/O (e.g. an external
/// NLU call); the engine does not assume they are instantaneous. An `Err`
/// returned here is treated by the pipeline as "not matched" and never
/// aborts the turn.
#[async_trait]
pub trait ConditionHandler: Send + Sync {
    async fn check(
        &self,
        ctx: &Context,
        graph: &ScriptGraph,
        input: &Value,
        cache: &TurnCache,
    ) -> Result<bool>;
}

/// A response generator for a node.
///
/// An `Err` returned here is fatal for the turn: context is not saved and no
/// response is delivered.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn respond(
        &self,
        ctx: &Context,
        graph: &ScriptGraph,
        input: &Value,
        cache: &TurnCache,
    ) -> Result<Value>;
}

/// Adapter wrapping a plain synchronous closure as a [`ConditionHandler`].
struct FnCondition<F>(F);

#[async_trait]
impl<F> ConditionHandler for FnCondition<F>
where
    F: Fn(&Context, &Value) -> bool + Send + Sync,
{
    async fn check(
        &self,
        ctx: &Context,
        _graph: &ScriptGraph,
        input: &Value,
        _cache: &TurnCache,
    ) -> Result<bool> {
        Ok((self.0)(ctx, input))
    }
}

/// Adapter wrapping a plain synchronous closure as a [`ResponseHandler`].
struct FnResponse<F>(F);

#[async_trait]
impl<F> ResponseHandler for FnResponse<F>
where
    F: Fn(&Context, &Value) -> Value + Send + Sync,
{
    async fn respond(
        &self,
        ctx: &Context,
        _graph: &ScriptGraph,
        input: &Value,
        _cache: &TurnCache,
    ) -> Result<Value> {
        Ok((self.0)(ctx, input))
    }
}

/// Registry of named handlers, consulted once at graph construction.
///
/// Names referenced by a script description that are missing from the
/// registry surface as `GraphValidation` issues, not runtime failures.
#[derive(Default)]
pub struct HandlerRegistry {
    conditions: HashMap<String, Arc<dyn ConditionHandler>>,
    responses: HashMap<String, Arc<dyn ResponseHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a condition handler under `name`, replacing any previous
    /// registration.
    pub fn register_condition(
        &mut self,
        name: impl Into<String>,
        handler: impl ConditionHandler + 'static,
    ) {
        self.conditions.insert(name.into(), Arc::new(handler));
    }

    /// Registers a synchronous closure as a condition handler.
    ///
    /// Convenience for the common case of a pure predicate over the context
    /// and the inbound payload.
    pub fn register_condition_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Context, &Value) -> bool + Send + Sync + 'static,
    {
        self.register_condition(name, FnCondition(f));
    }

    /// Registers a response handler under `name`, replacing any previous
    /// registration.
    pub fn register_response(
        &mut self,
        name: impl Into<String>,
        handler: impl ResponseHandler + 'static,
    ) {
        self.responses.insert(name.into(), Arc::new(handler));
    }

    /// Registers a synchronous closure as a response handler.
    pub fn register_response_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Context, &Value) -> Value + Send + Sync + 'static,
    {
        self.register_response(name, FnResponse(f));
    }

    /// Looks up a condition handler by name.
    pub fn condition(&self, name: &str) -> Option<Arc<dyn ConditionHandler>> {
        self.conditions.get(name).cloned()
    }

    /// Looks up a response handler by name.
    pub fn response(&self, name: &str) -> Option<Arc<dyn ResponseHandler>> {
        self.responses.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeAddress;
    use crate::script::source::ScriptSource;
    use serde_json::json;

    fn empty_graph() -> ScriptGraph {
        let mut registry = HandlerRegistry::new();
        registry.register_condition_fn("always", |_, _| true);
        registry.register_response_fn("echo", |_, input| input.clone());
        let source = ScriptSource::new(NodeAddress::new("f", "a"), NodeAddress::new("f", "a"))
            .with_flow(crate::script::source::FlowSource::new("f").with_node(
                crate::script::source::NodeSource::new("a", "echo"),
            ));
        ScriptGraph::build(&source, &registry).unwrap()
    }

    #[tokio::test]
    async fn test_closure_condition_sees_context_and_input() {
        let mut registry = HandlerRegistry::new();
        registry.register_condition_fn("said_hi", |_ctx, input| input == &json!("hi"));

        let graph = empty_graph();
        let ctx = Context::fresh("u1", NodeAddress::new("f", "a"));
        let cache = TurnCache::new();

        let handler = registry.condition("said_hi").unwrap();
        assert!(handler.check(&ctx, &graph, &json!("hi"), &cache).await.unwrap());
        assert!(!handler.check(&ctx, &graph, &json!("yo"), &cache).await.unwrap());
    }

    #[tokio::test]
    async fn test_closure_response_produces_payload() {
        let mut registry = HandlerRegistry::new();
        registry.register_response_fn("greet", |_ctx, _input| json!("Hello!"));

        let graph = empty_graph();
        let ctx = Context::fresh("u1", NodeAddress::new("f", "a"));
        let cache = TurnCache::new();

        let handler = registry.response("greet").unwrap();
        let payload = handler.respond(&ctx, &graph, &json!("hi"), &cache).await.unwrap();
        assert_eq!(payload, json!("Hello!"));
    }

    #[test]
    fn test_unknown_names_are_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.condition("missing").is_none());
        assert!(registry.response("missing").is_none());
    }
}
