//! Context store trait.
//!
//! Defines the interface for per-user context persistence.

use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract store for per-user conversational context.
///
/// This trait defines the contract for persisting and retrieving contexts,
/// decoupling the pipeline from the specific storage mechanism (in-memory
/// map, JSON files, external key-value store).
///
/// # Contract
///
/// - `load` on an unknown user id returns `Ok(None)`; the pipeline then
///   initializes a fresh context at the graph's start node, so an unknown
///   user is never an error.
/// - `save` must be atomic with respect to a single user id: a concurrent
///   save for the same user from a different turn must not interleave
///   partial writes. Last-writer-wins at whole-context granularity is
///   acceptable; no finer-grained merge is required. (The pipeline already
///   serializes turns per user within one process; a store shared across
///   processes is responsible for any cross-process atomicity.)
/// - I/O failures surface as `ChatflowError::Storage` and are fatal for the
///   turn that triggered them; persisted state is assumed unchanged.
///
/// `delete` and `list_user_ids` are administrative operations; the engine
/// itself never deletes a context.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Loads the context for a user.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Context))`: context found
    /// - `Ok(None)`: no context stored for this user yet
    /// - `Err(_)`: storage failure
    async fn load(&self, user_id: &str) -> Result<Option<Context>>;

    /// Saves a context, replacing any previous one for the same user.
    async fn save(&self, context: &Context) -> Result<()>;

    /// Deletes the context for a user, if any. Administrative operation.
    async fn delete(&self, user_id: &str) -> Result<()>;

    /// Lists all user ids with a stored context. Administrative operation.
    async fn list_user_ids(&self) -> Result<Vec<String>>;
}
