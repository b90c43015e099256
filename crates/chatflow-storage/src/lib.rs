//! Context store backends for the Chatflow engine.
//!
//! Implementations of [`chatflow_core::store::ContextStore`]:
//!
//! - [`memory::InMemoryContextStore`]: process-lifetime map, the default
//! - [`file::FileContextStore`]: one JSON file per user, durable across
//!   restarts
//!
//! Both satisfy the same contract; external backends (key-value store
//! adapters) implement the trait in their own crates.

pub mod file;
pub mod memory;

// Re-export public API
pub use file::FileContextStore;
pub use memory::InMemoryContextStore;
