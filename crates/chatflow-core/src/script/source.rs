//! Declarative script description.
//!
//! A [`ScriptSource`] enumerates flows, nodes, response handler names and
//! ordered transitions. It is the only surface format the engine consumes:
//! deserializable from TOML or JSON, or assembled programmatically with the
//! builder helpers. Construction of a runnable [`super::ScriptGraph`]
//! validates the description eagerly.
//!
//! # Format
//!
//! ```toml
//! start = { flow = "greeting", node = "start" }
//! fallback = { flow = "greeting", node = "fallback" }
//!
//! [[flows]]
//! name = "greeting"
//!
//! [[flows.nodes]]
//! name = "start"
//! response = "ask_name"
//!
//! [[flows.nodes.transitions]]
//! condition = "always"
//! target = { flow = "greeting", node = "greet" }
//! priority = 1
//! ```

use crate::context::NodeAddress;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declarative description of a complete script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSource {
    /// Address new conversations start at
    pub start: NodeAddress,
    /// Address selected when no transition matches
    pub fallback: NodeAddress,
    /// Flows in declaration order
    #[serde(default)]
    pub flows: Vec<FlowSource>,
}

/// A named group of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSource {
    pub name: String,
    /// Nodes in declaration order
    #[serde(default)]
    pub nodes: Vec<NodeSource>,
}

/// A single dialogue node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSource {
    pub name: String,
    /// Registered name of the node's response handler
    pub response: String,
    /// Outgoing transitions in declaration order (order breaks priority ties)
    #[serde(default)]
    pub transitions: Vec<TransitionSource>,
}

/// A guarded edge to another node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSource {
    /// Registered name of the guard condition handler
    pub condition: String,
    /// Higher priority wins; ties broken by declaration order
    #[serde(default)]
    pub priority: i64,
    /// Destination node
    pub target: NodeAddress,
}

impl ScriptSource {
    /// Creates an empty script description with the given start and
    /// fallback addresses.
    pub fn new(start: NodeAddress, fallback: NodeAddress) -> Self {
        Self {
            start,
            fallback,
            flows: Vec::new(),
        }
    }

    /// Appends a flow, builder style.
    pub fn with_flow(mut self, flow: FlowSource) -> Self {
        self.flows.push(flow);
        self
    }

    /// Parses a script description from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parses a script description from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Checks the structural invariants of the description without
    /// resolving handler names: duplicate node addresses, unresolved
    /// start/fallback addresses, and unresolved transition targets.
    ///
    /// Returns every issue found. An empty list means the structure is
    /// sound; handler resolution happens in `ScriptGraph::build`.
    pub fn validate_structure(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut declared: HashSet<NodeAddress> = HashSet::new();

        for flow in &self.flows {
            for node in &flow.nodes {
                let address = NodeAddress::new(&flow.name, &node.name);
                if !declared.insert(address.clone()) {
                    issues.push(format!("duplicate node address '{}'", address));
                }
            }
        }

        if !declared.contains(&self.start) {
            issues.push(format!("start node '{}' is not declared", self.start));
        }
        if !declared.contains(&self.fallback) {
            issues.push(format!("fallback node '{}' is not declared", self.fallback));
        }

        for flow in &self.flows {
            for node in &flow.nodes {
                for transition in &node.transitions {
                    if !declared.contains(&transition.target) {
                        issues.push(format!(
                            "transition from '{}:{}' targets undeclared node '{}'",
                            flow.name, node.name, transition.target
                        ));
                    }
                }
            }
        }

        issues
    }
}

impl FlowSource {
    /// Creates an empty flow with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Appends a node, builder style.
    pub fn with_node(mut self, node: NodeSource) -> Self {
        self.nodes.push(node);
        self
    }
}

impl NodeSource {
    /// Creates a node with the given name and response handler name.
    pub fn new(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: response.into(),
            transitions: Vec::new(),
        }
    }

    /// Appends a transition, builder style.
    pub fn with_transition(
        mut self,
        condition: impl Into<String>,
        target: NodeAddress,
        priority: i64,
    ) -> Self {
        self.transitions.push(TransitionSource {
            condition: condition.into(),
            target,
            priority,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_source() -> ScriptSource {
        ScriptSource::new(
            NodeAddress::new("greeting", "start"),
            NodeAddress::new("greeting", "fallback"),
        )
        .with_flow(
            FlowSource::new("greeting")
                .with_node(NodeSource::new("start", "ask_name").with_transition(
                    "always",
                    NodeAddress::new("greeting", "fallback"),
                    0,
                ))
                .with_node(NodeSource::new("fallback", "shrug")),
        )
    }

    #[test]
    fn test_valid_structure_has_no_issues() {
        assert!(two_node_source().validate_structure().is_empty());
    }

    #[test]
    fn test_duplicate_address_reported() {
        let mut source = two_node_source();
        source.flows[0]
            .nodes
            .push(NodeSource::new("start", "ask_name"));
        let issues = source.validate_structure();
        assert!(issues.iter().any(|i| i.contains("duplicate node address")));
    }

    #[test]
    fn test_undeclared_start_and_fallback_reported() {
        let mut source = two_node_source();
        source.start = NodeAddress::new("missing", "node");
        source.fallback = NodeAddress::new("missing", "other");
        let issues = source.validate_structure();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_undeclared_target_reported() {
        let mut source = two_node_source();
        source.flows[0].nodes[0]
            .transitions
            .push(TransitionSource {
                condition: "always".to_string(),
                target: NodeAddress::new("greeting", "ghost"),
                priority: 0,
            });
        let issues = source.validate_structure();
        assert!(issues.iter().any(|i| i.contains("ghost")));
    }

    #[test]
    fn test_toml_round_trip() {
        let source = two_node_source();
        let toml_str = toml::to_string(&source).unwrap();
        let parsed = ScriptSource::from_toml_str(&toml_str).unwrap();
        assert_eq!(source, parsed);
    }

    #[test]
    fn test_parse_toml_document() {
        let doc = r#"
            start = { flow = "greeting", node = "start" }
            fallback = { flow = "greeting", node = "start" }

            [[flows]]
            name = "greeting"

            [[flows.nodes]]
            name = "start"
            response = "greet"

            [[flows.nodes.transitions]]
            condition = "always"
            target = { flow = "greeting", node = "start" }
            priority = 2
        "#;
        let source = ScriptSource::from_toml_str(doc).unwrap();
        assert_eq!(source.flows.len(), 1);
        assert_eq!(source.flows[0].nodes[0].transitions[0].priority, 2);
        assert!(source.validate_structure().is_empty());
    }
}
