//! Per-user conversational context.
//!
//! This module contains the core domain entities the pipeline operates on:
//! the [`NodeAddress`] composite key, the append-only [`TurnRecord`] log
//! entry, and the [`Context`] itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Composite key `(flow, node)` uniquely identifying a node in the script
/// graph.
///
/// Equality and hashing are well-defined so addresses can be used as map
/// keys; no total ordering is required or provided.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Name of the flow the node belongs to
    pub flow: String,
    /// Name of the node within the flow
    pub node: String,
}

impl NodeAddress {
    /// Creates a new node address.
    pub fn new(flow: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            node: node.into(),
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.flow, self.node)
    }
}

/// A single completed turn in a conversation.
///
/// Records the node the turn started at, the raw inbound payload, and the
/// response payload produced by the selected node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Address of the node the turn started at
    pub node: NodeAddress,
    /// Raw inbound payload for this turn
    pub input: Value,
    /// Response payload delivered for this turn
    pub response: Value,
}

/// Per-user conversational state.
///
/// A context contains:
/// - The stable user identifier it is keyed by
/// - An append-only log of completed turns (most recent last)
/// - An arbitrary key-value slot mapping for condition/response handlers
/// - The address of the node the conversation currently sits at
/// - Creation/update timestamps (ISO 8601 format)
///
/// # Invariants
///
/// - Exactly one context exists per user identifier at any time.
/// - The turn log is monotonically append-only; records are never mutated
///   retroactively. The field is private and only [`Context::push_turn`]
///   can extend it.
/// - The current node address always refers to a node in the script graph;
///   the pipeline re-checks this at the start of every turn.
///
/// A context is created on the first-ever message from a user identifier,
/// initialized at the graph's designated start node, and is loaded, mutated
/// and saved exactly once per turn by the pipeline. The engine never deletes
/// contexts; deletion is a store-level administrative operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Stable user identifier this context is keyed by
    pub user_id: String,
    /// Completed turns, most recent last (append-only)
    turns: Vec<TurnRecord>,
    /// Arbitrary handler-owned data ("slots")
    #[serde(default)]
    pub slots: HashMap<String, Value>,
    /// Address of the node the conversation currently sits at
    pub current_node: NodeAddress,
    /// Timestamp when the context was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the context was last updated (ISO 8601 format)
    pub updated_at: String,
}

impl Context {
    /// Creates a fresh context for a first-time user, positioned at the
    /// given start node.
    pub fn fresh(user_id: impl Into<String>, start: NodeAddress) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            user_id: user_id.into(),
            turns: Vec::new(),
            slots: HashMap::new(),
            current_node: start,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Appends a completed turn to the log and refreshes `updated_at`.
    ///
    /// This is the only way to extend the turn log, preserving the
    /// append-only invariant.
    pub fn push_turn(&mut self, node: NodeAddress, input: Value, response: Value) {
        self.turns.push(TurnRecord {
            node,
            input,
            response,
        });
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// All completed turns, oldest first.
    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    /// The most recent completed turn, if any.
    pub fn last_turn(&self) -> Option<&TurnRecord> {
        self.turns.last()
    }

    /// Number of completed turns.
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Reads a slot value by key.
    pub fn slot(&self, key: &str) -> Option<&Value> {
        self.slots.get(key)
    }

    /// Writes a slot value.
    pub fn set_slot(&mut self, key: impl Into<String>, value: Value) {
        self.slots.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_context_starts_empty() {
        let ctx = Context::fresh("u1", NodeAddress::new("greeting", "start"));
        assert_eq!(ctx.user_id, "u1");
        assert_eq!(ctx.turn_count(), 0);
        assert!(ctx.slots.is_empty());
        assert_eq!(ctx.current_node, NodeAddress::new("greeting", "start"));
    }

    #[test]
    fn test_push_turn_appends_in_order() {
        let mut ctx = Context::fresh("u1", NodeAddress::new("f", "a"));
        ctx.push_turn(NodeAddress::new("f", "a"), json!("hi"), json!("hello"));
        ctx.push_turn(NodeAddress::new("f", "b"), json!("bye"), json!("goodbye"));

        assert_eq!(ctx.turn_count(), 2);
        assert_eq!(ctx.turns()[0].input, json!("hi"));
        assert_eq!(ctx.last_turn().unwrap().response, json!("goodbye"));
    }

    #[test]
    fn test_slots_round_trip() {
        let mut ctx = Context::fresh("u1", NodeAddress::new("f", "a"));
        ctx.set_slot("name", json!("Ada"));
        assert_eq!(ctx.slot("name"), Some(&json!("Ada")));
        assert_eq!(ctx.slot("missing"), None);
    }

    #[test]
    fn test_context_serde_round_trip() {
        let mut ctx = Context::fresh("u1", NodeAddress::new("f", "a"));
        ctx.set_slot("count", json!(3));
        ctx.push_turn(NodeAddress::new("f", "a"), json!("hi"), json!("hello"));

        let serialized = serde_json::to_string(&ctx).unwrap();
        let restored: Context = serde_json::from_str(&serialized).unwrap();
        assert_eq!(ctx, restored);
    }

    #[test]
    fn test_node_address_display() {
        let addr = NodeAddress::new("greeting", "start");
        assert_eq!(addr.to_string(), "greeting:start");
    }
}
