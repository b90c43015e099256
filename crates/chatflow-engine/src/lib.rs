//! Chatflow engine: the turn-execution pipeline.
//!
//! # Module Structure
//!
//! - `pipeline`: the per-turn state machine (`Pipeline`, `TurnOutcome`)
//! - `locks`: per-user turn serialization (`UserLocks`)
//! - `runner`: the receive loop (`PipelineRunner`)
//! - `channel`: in-process channel messenger adapter (`ChannelMessenger`)

pub mod channel;
pub mod locks;
pub mod pipeline;
pub mod runner;

// Re-export public API
pub use channel::ChannelMessenger;
pub use locks::UserLocks;
pub use pipeline::{Pipeline, TurnOutcome};
pub use runner::PipelineRunner;
