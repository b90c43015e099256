//! Chatflow core: domain types and contracts for the dialogue execution
//! engine.
//!
//! This crate holds everything the engine and its storage backends agree
//! on: the per-user [`context::Context`], the validated
//! [`script::ScriptGraph`] and its handler contract, the per-turn
//! [`cache::TurnCache`], the [`store::ContextStore`] and
//! [`messenger::MessengerInterface`] boundaries, telemetry event types and
//! the shared error type.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod messenger;
pub mod script;
pub mod store;
pub mod telemetry;

// Re-export common error type
pub use error::{ChatflowError, Result};

pub use cache::{CacheKey, TurnCache};
pub use config::{DeliveryPolicy, PipelineConfig, StorageConfig};
pub use context::{Context, NodeAddress, TurnRecord};
pub use messenger::{InboundMessage, MessengerInterface};
pub use script::{HandlerRegistry, ScriptGraph, ScriptSource};
pub use store::ContextStore;
pub use telemetry::{TurnEvent, TurnOutcomeKind, TurnStage};
