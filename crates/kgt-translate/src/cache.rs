//! Completion cache
//!
//! `CachedLlmClient` wraps any [`LlmClient`] and memoizes completions by
//! prompt, so translating the same text twice does not repeat the graph
//! extraction, gender and translation calls.
//!
//! Uses the moka crate for thread-safe, async-compatible caching with TTL
//! support. Only successful completions are cached.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use kgt_core::{CacheConfig, LlmClient, Result};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Cached Client
// ============================================================================

/// LLM client decorator that caches completions keyed by prompt
pub struct CachedLlmClient {
    inner: Arc<dyn LlmClient>,
    cache: Cache<u64, String>,
    stats: Arc<CacheStats>,
}

impl CachedLlmClient {
    /// Wrap a client using the given cache settings
    pub fn new(inner: Arc<dyn LlmClient>, config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            inner,
            cache,
            stats: Arc::new(CacheStats::new("completion")),
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get current cache size
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Clear all cached completions
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        // Wait for all pending invalidations to complete
        self.cache.run_pending_tasks().await;
        self.stats.reset();
    }
}

#[async_trait]
impl LlmClient for CachedLlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let key = hash_text(prompt);

        if let Some(hit) = self.cache.get(&key).await {
            self.stats.record_hit();
            tracing::debug!(backend = self.inner.name(), "Completion cache hit");
            return Ok(hit);
        }
        self.stats.record_miss();

        let completion = self.inner.generate(prompt).await?;
        self.cache.insert(key, completion.clone()).await;
        self.stats.record_write();

        Ok(completion)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ============================================================================
// Cache Statistics
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug)]
pub struct CacheStats {
    /// Cache name for identification
    name: String,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Get total requests (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Calculate hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Get a summary report
    pub fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            name: self.name.clone(),
            hits: self.hits(),
            misses: self.misses(),
            writes: self.writes(),
            total_requests: self.total_requests(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Serializable cache statistics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub total_requests: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

/// Hash text to a 64-bit value for cache keys
fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kgt_core::{KgtError, UnavailableBackend};

    struct Counting {
        calls: AtomicU64,
    }

    #[async_trait]
    impl LlmClient for Counting {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{prompt}#{n}"))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_repeated_prompt_served_from_cache() {
        let inner = Arc::new(Counting {
            calls: AtomicU64::new(0),
        });
        let client = CachedLlmClient::new(inner.clone(), &CacheConfig::default());

        assert_eq!(client.generate("hello").await.unwrap(), "hello#0");
        assert_eq!(client.generate("hello").await.unwrap(), "hello#0");
        assert_eq!(client.generate("other").await.unwrap(), "other#1");

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        let stats = client.stats();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 2);
        assert_eq!(stats.writes(), 2);
        assert_eq!(client.name(), "counting");
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let client = CachedLlmClient::new(
            Arc::new(UnavailableBackend::new("down")),
            &CacheConfig::default(),
        );

        for _ in 0..2 {
            assert!(matches!(
                client.generate("hello").await,
                Err(KgtError::AdapterUnavailable(_))
            ));
        }
        assert_eq!(client.stats().misses(), 2);
        assert_eq!(client.stats().writes(), 0);
    }

    #[tokio::test]
    async fn test_clear_resets() {
        let client = CachedLlmClient::new(
            Arc::new(Counting {
                calls: AtomicU64::new(0),
            }),
            &CacheConfig::default(),
        );
        client.generate("hello").await.unwrap();
        client.clear().await;

        assert_eq!(client.entry_count(), 0);
        assert_eq!(client.stats().report().total_requests, 0);
    }

    #[test]
    fn test_hit_rate_empty() {
        let stats = CacheStats::new("test");
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.name(), "test");
    }
}
