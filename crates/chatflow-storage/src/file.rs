//! File-backed ContextStore implementation.
//!
//! Stores one JSON file per user id, durable across process restarts.
//!
//! Directory structure:
//! ```text
//! base_dir/
//! └── contexts/
//!     ├── u1.json
//!     └── u2.json
//! ```
//!
//! Saves are atomic per user: the context is written to a temporary file in
//! the same directory and renamed over the target, under an advisory `fs2`
//! lock on a sibling lock file so concurrent writers from other processes
//! cannot interleave.

use async_trait::async_trait;
use chatflow_core::context::Context;
use chatflow_core::error::{ChatflowError, Result};
use chatflow_core::store::ContextStore;
use fs2::FileExt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A context store backed by one JSON file per user.
pub struct FileContextStore {
    contexts_dir: PathBuf,
}

impl FileContextStore {
    /// Creates a new `FileContextStore` rooted at `base_dir`.
    ///
    /// The `contexts/` subdirectory is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the directory cannot be created.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let contexts_dir = base_dir.as_ref().join("contexts");
        fs::create_dir_all(&contexts_dir).await.map_err(|e| {
            ChatflowError::storage(format!(
                "failed to create contexts directory {:?}: {}",
                contexts_dir, e
            ))
        })?;
        Ok(Self { contexts_dir })
    }

    /// Creates a `FileContextStore` at the default location
    /// (`<platform data dir>/chatflow`).
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or the
    /// directory structure cannot be created.
    pub async fn default_location() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| ChatflowError::storage("failed to determine data directory"))?;
        Self::new(data_dir.join("chatflow")).await
    }

    /// Returns the directory context files live in.
    pub fn contexts_dir(&self) -> &Path {
        &self.contexts_dir
    }

    fn context_path(&self, user_id: &str) -> PathBuf {
        self.contexts_dir
            .join(format!("{}.json", encode_user_id(user_id)))
    }
}

#[async_trait]
impl ContextStore for FileContextStore {
    async fn load(&self, user_id: &str) -> Result<Option<Context>> {
        let path = self.context_path(user_id);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ChatflowError::storage(format!(
                    "failed to read {:?}: {}",
                    path, e
                )));
            }
        };
        let context: Context = serde_json::from_slice(&content)?;
        Ok(Some(context))
    }

    async fn save(&self, context: &Context) -> Result<()> {
        let path = self.context_path(&context.user_id);
        let tmp_path = path.with_extension("json.tmp");
        let lock_path = path.with_extension("json.lock");
        let payload = serde_json::to_vec_pretty(context)?;

        // The advisory lock and rename are cheap blocking syscalls; run the
        // whole save off the async worker threads.
        tokio::task::spawn_blocking(move || -> Result<()> {
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .map_err(|e| {
                    ChatflowError::storage(format!("failed to open {:?}: {}", lock_path, e))
                })?;
            lock_file.lock_exclusive().map_err(|e| {
                ChatflowError::storage(format!("failed to lock {:?}: {}", lock_path, e))
            })?;

            let result = std::fs::write(&tmp_path, &payload)
                .and_then(|_| std::fs::rename(&tmp_path, &path))
                .map_err(|e| {
                    ChatflowError::storage(format!("failed to write {:?}: {}", path, e))
                });

            let _ = lock_file.unlock();
            result
        })
        .await
        .map_err(|e| ChatflowError::storage(format!("save task failed: {}", e)))??;

        tracing::debug!(user_id = %context.user_id, "context saved");
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let path = self.context_path(user_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChatflowError::storage(format!(
                "failed to delete {:?}: {}",
                path, e
            ))),
        }
    }

    async fn list_user_ids(&self) -> Result<Vec<String>> {
        let mut user_ids = Vec::new();
        let mut entries = fs::read_dir(&self.contexts_dir).await.map_err(|e| {
            ChatflowError::storage(format!(
                "failed to read {:?}: {}",
                self.contexts_dir, e
            ))
        })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChatflowError::storage(format!("failed to list contexts: {}", e)))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(encoded) = name.strip_suffix(".json") {
                if let Some(user_id) = decode_user_id(encoded) {
                    user_ids.push(user_id);
                }
            }
        }
        Ok(user_ids)
    }
}

/// Encodes a user id into a filesystem-safe file stem.
///
/// Alphanumerics, `-`, `_` and `.` pass through; every other byte becomes
/// `%XX`. The encoding is reversible so `list_user_ids` can recover the
/// original ids.
fn encode_user_id(user_id: &str) -> String {
    let mut encoded = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

fn decode_user_id(encoded: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut chars = encoded.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'%' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::context::NodeAddress;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_unknown_user_is_none() {
        let dir = tempdir().unwrap();
        let store = FileContextStore::new(dir.path()).await.unwrap();
        assert_eq!(store.load("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileContextStore::new(dir.path()).await.unwrap();

        let mut ctx = Context::fresh("u1", NodeAddress::new("f", "start"));
        ctx.set_slot("count", json!(2));
        ctx.push_turn(NodeAddress::new("f", "start"), json!("hi"), json!("hello"));

        store.save(&ctx).await.unwrap();
        let loaded = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded, ctx);
    }

    #[tokio::test]
    async fn test_save_survives_reopen() {
        let dir = tempdir().unwrap();
        let ctx = Context::fresh("u1", NodeAddress::new("f", "start"));
        {
            let store = FileContextStore::new(dir.path()).await.unwrap();
            store.save(&ctx).await.unwrap();
        }
        let store = FileContextStore::new(dir.path()).await.unwrap();
        assert_eq!(store.load("u1").await.unwrap(), Some(ctx));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let dir = tempdir().unwrap();
        let store = FileContextStore::new(dir.path()).await.unwrap();
        store
            .save(&Context::fresh("u1", NodeAddress::new("f", "a")))
            .await
            .unwrap();
        store
            .save(&Context::fresh("u2", NodeAddress::new("f", "a")))
            .await
            .unwrap();

        let mut ids = store.list_user_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["u1", "u2"]);

        store.delete("u1").await.unwrap();
        store.delete("u1").await.unwrap(); // idempotent
        assert_eq!(store.load("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unsafe_user_ids_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileContextStore::new(dir.path()).await.unwrap();

        let user_id = "telegram/chat#42 ünïcode";
        let ctx = Context::fresh(user_id, NodeAddress::new("f", "a"));
        store.save(&ctx).await.unwrap();

        assert_eq!(store.load(user_id).await.unwrap(), Some(ctx));
        assert_eq!(store.list_user_ids().await.unwrap(), vec![user_id]);
    }

    #[test]
    fn test_encode_decode_user_id() {
        for id in ["plain", "with space", "a/b", "ünïcode", "%already"] {
            assert_eq!(decode_user_id(&encode_user_id(id)).as_deref(), Some(id));
        }
    }
}
