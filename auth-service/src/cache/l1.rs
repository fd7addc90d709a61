//! # L1 In-Process Cache
//!
//! The fastest, least durable tier (§4.4): a per-instance [`moka::future::Cache`]
//! keyed by string, holding JSON blobs so it can back any cacheable shape
//! (resolved identities, client lookups) without a generic parameter per call
//! site. Lost on restart and never shared across instances - that's the
//! point, L2/L3 exist to survive both.

use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Thin wrapper around a `moka` cache storing pre-serialized JSON so one
/// instance can hold values of different shapes.
#[derive(Clone)]
pub struct L1Cache {
    inner: Cache<String, String>,
}

impl L1Cache {
    /// `max_capacity` bounds entry count; `ttl` is the uniform per-entry
    /// time-to-live (§4.4 uses one TTL for the whole UAI tier).
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build();
        Self { inner }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.inner.get(key).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(raw) = serde_json::to_string(value) {
            self.inner.insert(key.to_string(), raw).await;
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    #[cfg(test)]
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl std::fmt::Debug for L1Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1Cache").field("entry_count", &self.inner.entry_count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = L1Cache::new(100, Duration::from_secs(60));
        cache.set("k1", &"value".to_string()).await;
        let got: Option<String> = cache.get("k1").await;
        assert_eq!(got, Some("value".to_string()));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let cache = L1Cache::new(100, Duration::from_secs(60));
        let got: Option<String> = cache.get("missing").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = L1Cache::new(100, Duration::from_secs(60));
        cache.set("k1", &42i32).await;
        cache.invalidate("k1").await;
        let got: Option<i32> = cache.get("k1").await;
        assert_eq!(got, None);
    }
}
