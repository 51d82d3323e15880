//! Routing Cache (spec §4.I) — fingerprint→decision memoization with TTL
//! and LRU eviction at capacity. Grounded on the teacher's `LLMCache`
//! (`agent/cache.rs`: a SHA256-fingerprinted `Arc<RwLock<HashMap>>`),
//! generalized from an unbounded response cache to a bounded, TTL-aware
//! `RoutingDecision` cache with an optional external backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::domain::RoutingDecision;

/// A stable hash of `(normalized_prompt, task_type, language, persona,
/// provider_preference)` (spec §4.I).
pub fn fingerprint(
    normalized_prompt: &str,
    task_type: &str,
    language: Option<&str>,
    persona: &str,
    provider_preference: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_prompt.as_bytes());
    hasher.update(b"\0");
    hasher.update(task_type.as_bytes());
    hasher.update(b"\0");
    hasher.update(language.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(persona.as_bytes());
    hasher.update(b"\0");
    hasher.update(provider_preference.unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}

/// Pluggable cache backend (spec §4.I: "optional external KV backend").
/// The in-memory default never errors; external backends may, in which
/// case the cache degrades to direct routing rather than failing the
/// request (spec: "any miss or backend failure degrades to direct
/// routing without error").
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<RoutingDecision>;
    async fn put(&self, key: &str, decision: RoutingDecision, ttl: Duration);
}

struct Entry {
    decision: RoutingDecision,
    created_at: Instant,
    ttl: Duration,
    last_accessed: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Default in-memory backend: TTL expiry plus LRU eviction at capacity.
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    capacity: usize,
}

impl InMemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self { entries: RwLock::new(HashMap::new()), capacity }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Option<RoutingDecision> {
        let mut entries = self.entries.write().await;
        let expired = entries.get(key).map(|e| e.is_expired()).unwrap_or(false);
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.last_accessed = Instant::now();
        Some(entry.decision.clone())
    }

    async fn put(&self, key: &str, decision: RoutingDecision, ttl: Duration) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            if let Some(lru_key) = entries.iter().min_by_key(|(_, e)| e.last_accessed).map(|(k, _)| k.clone()) {
                entries.remove(&lru_key);
            }
        }
        let now = Instant::now();
        entries.insert(key.to_string(), Entry { decision, created_at: now, ttl, last_accessed: now });
    }
}

/// Routing Cache facade (spec §4.I). Wraps a [`CacheBackend`] with the
/// default TTL applied on `put`.
pub struct RoutingCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl RoutingCache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self { backend, default_ttl }
    }

    pub fn in_memory(capacity: usize, default_ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCache::new(capacity)), default_ttl)
    }

    pub async fn get(&self, key: &str) -> Option<RoutingDecision> {
        self.backend.get(key).await
    }

    pub async fn put(&self, key: &str, decision: RoutingDecision) {
        self.backend.put(key, decision, self.default_ttl).await;
    }
}
