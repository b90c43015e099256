//! In-memory ContextStore implementation.
//!
//! Process-lifetime only; contexts are lost on restart. Useful for tests,
//! the CLI default, and embedders that persist elsewhere.

use async_trait::async_trait;
use chatflow_core::context::Context;
use chatflow_core::error::Result;
use chatflow_core::store::ContextStore;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A context store backed by a process-local map.
///
/// Saves replace the whole context for a user under a write lock, so a save
/// is atomic per user id by construction.
#[derive(Default)]
pub struct InMemoryContextStore {
    contexts: RwLock<HashMap<String, Context>>,
}

impl InMemoryContextStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored contexts.
    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Whether the store holds no contexts.
    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn load(&self, user_id: &str) -> Result<Option<Context>> {
        let contexts = self.contexts.read().await;
        Ok(contexts.get(user_id).cloned())
    }

    async fn save(&self, context: &Context) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        contexts.insert(context.user_id.clone(), context.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let mut contexts = self.contexts.write().await;
        contexts.remove(user_id);
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>> {
        let contexts = self.contexts.read().await;
        Ok(contexts.keys().cloned().collect())
    }
}
