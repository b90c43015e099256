//! Script description, validation and the runnable graph.
//!
//! # Module Structure
//!
//! - `source`: declarative script description (`ScriptSource`), TOML/JSON
//!   parsing and structural validation
//! - `handler`: condition/response handler contract and named registry
//! - `graph`: validated immutable `ScriptGraph` with resolved handlers
//! - `conditions`: builtin condition handlers and combinators

pub mod conditions;
pub mod graph;
pub mod handler;
pub mod source;

// Re-export public API
pub use conditions::{All, Always, Any, ExactMatch, Never, Not, register_builtin_conditions};
pub use graph::{Node, ScriptGraph, Transition};
pub use handler::{ConditionHandler, HandlerRegistry, ResponseHandler};
pub use source::{FlowSource, NodeSource, ScriptSource, TransitionSource};
