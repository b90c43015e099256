//! Per-turn memoization cache.
//!
//! Expensive condition/response computations invoked more than once within a
//! single turn are computed once and replayed from the cache. The cache is
//! created fresh at the start of each turn, passed by reference into every
//! handler invocation for that turn, and discarded when the turn completes
//! (success or failure). It is never shared across turns or users, so no
//! eviction policy is needed.

use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

/// Which handler kind a cache entry belongs to.
///
/// A condition and a response handler may share a name; the kind keeps their
/// entries distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Condition,
    Response,
}

/// Cache key: handler name, handler kind, and the canonical JSON encoding
/// of the argument payload.
///
/// serde_json renders maps in sorted key order, so identical payloads share
/// the same key within a turn regardless of how they were constructed. The
/// full encoding is kept rather than a digest, so distinct payloads can
/// never alias. The cache lives for one turn, keys never accumulate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: CacheKind,
    handler: String,
    args: String,
}

impl CacheKey {
    /// Key for a condition handler invocation.
    pub fn condition(handler: impl Into<String>, input: &Value) -> Self {
        Self {
            kind: CacheKind::Condition,
            handler: handler.into(),
            args: input.to_string(),
        }
    }

    /// Key for a response handler invocation.
    pub fn response(handler: impl Into<String>, input: &Value) -> Self {
        Self {
            kind: CacheKind::Response,
            handler: handler.into(),
            args: input.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum CachedResult {
    Bool(bool),
    Payload(Value),
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CachedResult>,
    hits: u64,
    misses: u64,
}

/// Memoization scope for exactly one turn of one user.
///
/// Exclusively owned by the pipeline invocation processing that turn. A turn
/// executes sequentially, so the interior mutex is never contended; it only
/// makes the cache shareable by reference across handler invocations.
#[derive(Default)]
pub struct TurnCache {
    inner: Mutex<CacheInner>,
}

impl TurnCache {
    /// Creates an empty cache for a new turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized boolean for `key`, or awaits `compute`, stores
    /// the result and returns it.
    ///
    /// On a cache hit the future is dropped without being polled, so the
    /// underlying handler body never runs. Errors are not cached: a failed
    /// computation will be retried if the same key is requested again.
    pub async fn condition<Fut>(&self, key: CacheKey, compute: Fut) -> Result<bool>
    where
        Fut: Future<Output = Result<bool>>,
    {
        if let Some(CachedResult::Bool(value)) = self.lookup(&key) {
            return Ok(value);
        }
        let value = compute.await?;
        self.store(key, CachedResult::Bool(value));
        Ok(value)
    }

    /// Returns the memoized payload for `key`, or awaits `compute`, stores
    /// the result and returns it.
    pub async fn response<Fut>(&self, key: CacheKey, compute: Fut) -> Result<Value>
    where
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(CachedResult::Payload(value)) = self.lookup(&key) {
            return Ok(value);
        }
        let value = compute.await?;
        self.store(key, CachedResult::Payload(value.clone()));
        Ok(value)
    }

    /// Number of cache hits so far this turn.
    pub fn hits(&self) -> u64 {
        self.inner.lock().expect("turn cache poisoned").hits
    }

    /// Number of cache misses so far this turn.
    pub fn misses(&self) -> u64 {
        self.inner.lock().expect("turn cache poisoned").misses
    }

    // The lock is only held for the map access itself, never across an
    // await point.
    fn lookup(&self, key: &CacheKey) -> Option<CachedResult> {
        let mut inner = self.inner.lock().expect("turn cache poisoned");
        match inner.entries.get(key).cloned() {
            Some(value) => {
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    fn store(&self, key: CacheKey, value: CachedResult) {
        let mut inner = self.inner.lock().expect("turn cache poisoned");
        inner.entries.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_condition_computed_once() {
        let cache = TurnCache::new();
        let calls = AtomicUsize::new(0);
        let input = json!("hi");

        for _ in 0..3 {
            let result = cache
                .condition(CacheKey::condition("always", &input), async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                })
                .await
                .unwrap();
            assert!(result);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_distinct_inputs_are_distinct_entries() {
        let cache = TurnCache::new();
        let calls = AtomicUsize::new(0);

        for input in [json!("a"), json!("b")] {
            cache
                .condition(CacheKey::condition("match", &input), async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(false)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_key_equality_tracks_full_payload() {
        let a = json!({"items": [1, 2, 3], "user": "alice"});
        let b = json!({"user": "alice", "items": [1, 2, 3]});
        let c = json!({"items": [1, 2, 4], "user": "alice"});

        // Same content in a different construction order is the same key;
        // any content difference is a different key.
        assert_eq!(
            CacheKey::condition("check", &a),
            CacheKey::condition("check", &b)
        );
        assert_ne!(
            CacheKey::condition("check", &a),
            CacheKey::condition("check", &c)
        );
    }

    #[tokio::test]
    async fn test_condition_and_response_keys_do_not_collide() {
        let cache = TurnCache::new();
        let input = json!("hi");

        let matched = cache
            .condition(CacheKey::condition("greet", &input), async { Ok(true) })
            .await
            .unwrap();
        let payload = cache
            .response(CacheKey::response("greet", &input), async {
                Ok(json!("Hello!"))
            })
            .await
            .unwrap();

        assert!(matched);
        assert_eq!(payload, json!("Hello!"));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = TurnCache::new();
        let calls = AtomicUsize::new(0);
        let input = json!("hi");

        let first = cache
            .condition(CacheKey::condition("flaky", &input), async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(crate::error::ChatflowError::condition("flaky", "boom"))
            })
            .await;
        assert!(first.is_err());

        let second = cache
            .condition(CacheKey::condition("flaky", &input), async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })
            .await
            .unwrap();
        assert!(second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
