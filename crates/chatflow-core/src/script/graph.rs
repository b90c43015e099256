//! Validated, immutable script graph.
//!
//! Built once from a [`ScriptSource`] and a [`HandlerRegistry`]; every
//! transition target, the start/fallback addresses and every handler name
//! are checked eagerly so a turn never discovers a broken script at
//! runtime. After construction the graph is read-only and safe to share
//! across concurrent pipeline invocations behind an `Arc` without locking.

use crate::context::NodeAddress;
use crate::error::{ChatflowError, Result};
use crate::script::handler::{ConditionHandler, HandlerRegistry, ResponseHandler};
use crate::script::source::ScriptSource;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A guarded edge to another node, with its condition handler resolved.
#[derive(Clone)]
pub struct Transition {
    /// Registered name of the condition handler (kept for caching and logs)
    pub condition_name: String,
    /// Resolved condition handler
    pub condition: Arc<dyn ConditionHandler>,
    /// Destination node address
    pub target: NodeAddress,
    /// Higher value wins; ties broken by declaration order
    pub priority: i64,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("condition", &self.condition_name)
            .field("target", &self.target)
            .field("priority", &self.priority)
            .finish()
    }
}

/// A dialogue node with its response handler resolved.
#[derive(Clone)]
pub struct Node {
    /// Address of this node
    pub address: NodeAddress,
    /// Registered name of the response handler (kept for caching and logs)
    pub response_name: String,
    /// Resolved response handler
    pub response: Arc<dyn ResponseHandler>,
    /// Outgoing transitions in evaluation order: priority descending,
    /// declaration order within equal priorities (stable sort at build time)
    pub transitions: Vec<Transition>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address)
            .field("response", &self.response_name)
            .field("transitions", &self.transitions)
            .finish()
    }
}

/// Immutable directed graph of dialogue nodes.
#[derive(Debug)]
pub struct ScriptGraph {
    nodes: HashMap<NodeAddress, Node>,
    start: NodeAddress,
    fallback: NodeAddress,
}

impl ScriptGraph {
    /// Builds and validates a graph from a declarative description.
    ///
    /// Validation collects every problem before failing: duplicate node
    /// addresses, unresolved start/fallback addresses, unresolved
    /// transition targets, and handler names missing from the registry.
    ///
    /// # Errors
    ///
    /// Returns `ChatflowError::GraphValidation` listing all issues found.
    pub fn build(source: &ScriptSource, registry: &HandlerRegistry) -> Result<Self> {
        let mut issues = source.validate_structure();
        let mut nodes: HashMap<NodeAddress, Node> = HashMap::new();

        for flow in &source.flows {
            for node_source in &flow.nodes {
                let address = NodeAddress::new(&flow.name, &node_source.name);

                let Some(response) = registry.response(&node_source.response) else {
                    issues.push(format!(
                        "node '{}' references unregistered response handler '{}'",
                        address, node_source.response
                    ));
                    continue;
                };

                let mut transitions = Vec::with_capacity(node_source.transitions.len());
                for transition in &node_source.transitions {
                    let Some(condition) = registry.condition(&transition.condition) else {
                        issues.push(format!(
                            "transition from '{}' references unregistered condition handler '{}'",
                            address, transition.condition
                        ));
                        continue;
                    };
                    transitions.push(Transition {
                        condition_name: transition.condition.clone(),
                        condition,
                        target: transition.target.clone(),
                        priority: transition.priority,
                    });
                }

                // Stable sort: declaration order survives among equal
                // priorities, so first-declared wins ties.
                transitions.sort_by(|a, b| b.priority.cmp(&a.priority));

                nodes.insert(
                    address.clone(),
                    Node {
                        address,
                        response_name: node_source.response.clone(),
                        response,
                        transitions,
                    },
                );
            }
        }

        if !issues.is_empty() {
            return Err(ChatflowError::graph_validation(issues));
        }

        Ok(Self {
            nodes,
            start: source.start.clone(),
            fallback: source.fallback.clone(),
        })
    }

    /// Looks up a node by address.
    ///
    /// # Errors
    ///
    /// Returns `ChatflowError::NodeNotFound` if the address does not
    /// resolve, which during a turn indicates graph/context drift.
    pub fn node(&self, address: &NodeAddress) -> Result<&Node> {
        self.nodes
            .get(address)
            .ok_or_else(|| ChatflowError::node_not_found(&address.flow, &address.node))
    }

    /// Address new conversations start at.
    pub fn start(&self) -> &NodeAddress {
        &self.start
    }

    /// Address selected when no transition matches.
    pub fn fallback(&self) -> &NodeAddress {
        &self.fallback
    }

    /// Whether an address resolves to a declared node.
    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.nodes.contains_key(address)
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::source::{FlowSource, NodeSource};
    use serde_json::json;

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register_condition_fn("always", |_, _| true);
        registry.register_condition_fn("never", |_, _| false);
        registry.register_response_fn("echo", |_, input| input.clone());
        registry.register_response_fn("greet", |_, _| json!("Hello!"));
        registry
    }

    fn valid_source() -> ScriptSource {
        ScriptSource::new(
            NodeAddress::new("main", "start"),
            NodeAddress::new("main", "fallback"),
        )
        .with_flow(
            FlowSource::new("main")
                .with_node(
                    NodeSource::new("start", "greet")
                        .with_transition("always", NodeAddress::new("main", "fallback"), 0),
                )
                .with_node(NodeSource::new("fallback", "echo")),
        )
    }

    #[test]
    fn test_build_succeeds_for_valid_source() {
        let graph = ScriptGraph::build(&valid_source(), &registry()).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.start(), &NodeAddress::new("main", "start"));
        assert_eq!(graph.fallback(), &NodeAddress::new("main", "fallback"));
        assert!(graph.contains(&NodeAddress::new("main", "start")));
    }

    #[test]
    fn test_unresolved_target_fails_build() {
        let mut source = valid_source();
        source.flows[0].nodes[0].transitions[0].target = NodeAddress::new("main", "ghost");
        let err = ScriptGraph::build(&source, &registry()).unwrap_err();
        assert!(err.is_graph_validation());
    }

    #[test]
    fn test_unresolved_start_or_fallback_fails_build() {
        let mut source = valid_source();
        source.start = NodeAddress::new("main", "ghost");
        assert!(
            ScriptGraph::build(&source, &registry())
                .unwrap_err()
                .is_graph_validation()
        );

        let mut source = valid_source();
        source.fallback = NodeAddress::new("main", "ghost");
        assert!(
            ScriptGraph::build(&source, &registry())
                .unwrap_err()
                .is_graph_validation()
        );
    }

    #[test]
    fn test_unregistered_handlers_fail_build_with_all_issues() {
        let mut source = valid_source();
        source.flows[0].nodes[0].response = "missing_response".to_string();
        source.flows[0].nodes[0].transitions[0].condition = "missing_condition".to_string();

        let err = ScriptGraph::build(&source, &registry()).unwrap_err();
        let ChatflowError::GraphValidation { issues } = err else {
            panic!("expected GraphValidation");
        };
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_node_lookup_unknown_address() {
        let graph = ScriptGraph::build(&valid_source(), &registry()).unwrap();
        let err = graph.node(&NodeAddress::new("main", "ghost")).unwrap_err();
        assert!(err.is_node_not_found());
    }

    #[test]
    fn test_transitions_sorted_by_priority_then_declaration() {
        let source = ScriptSource::new(
            NodeAddress::new("main", "start"),
            NodeAddress::new("main", "start"),
        )
        .with_flow(
            FlowSource::new("main")
                .with_node(
                    NodeSource::new("start", "greet")
                        .with_transition("always", NodeAddress::new("main", "x"), 5)
                        .with_transition("never", NodeAddress::new("main", "y"), 5)
                        .with_transition("always", NodeAddress::new("main", "z"), 10),
                )
                .with_node(NodeSource::new("x", "echo"))
                .with_node(NodeSource::new("y", "echo"))
                .with_node(NodeSource::new("z", "echo")),
        );

        let graph = ScriptGraph::build(&source, &registry()).unwrap();
        let node = graph.node(&NodeAddress::new("main", "start")).unwrap();
        let order: Vec<&str> = node
            .transitions
            .iter()
            .map(|t| t.target.node.as_str())
            .collect();
        assert_eq!(order, vec!["z", "x", "y"]);
    }
}
