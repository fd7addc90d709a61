//! # Tiered Cache Orchestration
//!
//! Implements the three-layer read-through/write-through cache described in
//! §4.4: L1 in-process (`cache::l1::L1Cache`) → L2 durable KV (`RedisClient`,
//! optional) → L3 authoritative relational store. The caller supplies the L3
//! lookup as a loader closure, since what "authoritative" means differs per
//! cached kind (an `oauth_clients` row, an `oauth_states` blob, a UAI
//! resolution derived from several tables).
//!
//! ## Degradation contract
//!
//! A failure reading or writing L1/L2 is logged and swallowed - those tiers
//! are never allowed to turn an available credential into an unavailable
//! one. Only an L3 (loader) failure propagates to the caller, since there is
//! no tier left to fall back to.

use serde::{de::DeserializeOwned, Serialize};
use shared::errors::ApiError;
use shared::redis_client::RedisClient;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::l1::L1Cache;

/// Which tier actually served a cache hit. Surfaced to callers (e.g. the
/// UAI resolver's `cacheLayer` field) for observability, not used to alter
/// behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayer {
    L1,
    L2,
    L3,
}

/// Orchestrates the three tiers behind one `get_or_load`/`put`/`invalidate`
/// API. Cloned freely - `L1Cache` and `RedisClient` are themselves cheap to
/// clone.
#[derive(Clone)]
pub struct TieredCache {
    l1: L1Cache,
    l2: Option<RedisClient>,
    ttl: Duration,
}

impl TieredCache {
    pub fn new(l1: L1Cache, l2: Option<RedisClient>, ttl: Duration) -> Self {
        Self { l1, l2, ttl }
    }

    /// Reads through L1 → L2 → `loader` (L3). On an L2-or-below hit, warms
    /// every faster tier that was cold so the next read short-circuits
    /// there (§4.9 step 2: "warm the upper layer").
    ///
    /// Returns `(value, layer)` so callers needing cache-hit observability
    /// don't have to re-derive it; `loader` errors propagate since L3 is
    /// authoritative and there is nothing left to fall back to.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> Result<Option<(T, CacheLayer)>, ApiError>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, ApiError>>,
    {
        if let Some(value) = self.l1.get::<T>(key).await {
            return Ok(Some((value, CacheLayer::L1)));
        }

        if let Some(l2) = &self.l2 {
            match l2.get::<T>(key).await {
                Ok(Some(value)) => {
                    self.l1.set(key, &value).await;
                    return Ok(Some((value, CacheLayer::L2)));
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(%key, %error, "L2 cache read failed, falling through to L3");
                }
            }
        }

        match loader().await? {
            Some(value) => {
                self.put(key, &value).await;
                Ok(Some((value, CacheLayer::L3)))
            }
            None => Ok(None),
        }
    }

    /// Writes to every reachable tier. L1 always succeeds (it's local); an
    /// L2 write failure is logged and otherwise ignored.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        self.l1.set(key, value).await;
        if let Some(l2) = &self.l2 {
            if let Err(error) = l2.set(key, value, Some(self.ttl)).await {
                warn!(%key, %error, "L2 cache write failed");
            }
        }
    }

    /// Removes `key` from every reachable tier. Called whenever an admin
    /// mutation revokes the identity or state the key describes (§4.9
    /// staleness contract).
    pub async fn invalidate(&self, key: &str) {
        self.l1.invalidate(key).await;
        if let Some(l2) = &self.l2 {
            if let Err(error) = l2.delete(key).await {
                warn!(%key, %error, "L2 cache invalidate failed");
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn l1_hit_short_circuits_loader() {
        let cache = TieredCache::new(L1Cache::new(100, Duration::from_secs(60)), None, Duration::from_secs(60));
        cache.put("k", &"cached".to_string()).await;

        let result = cache
            .get_or_load::<String, _, _>("k", || async { panic!("loader should not run") })
            .await
            .unwrap();
        assert_eq!(result.unwrap().1, CacheLayer::L1);
    }

    #[tokio::test]
    async fn miss_falls_through_to_loader_and_warms_l1() {
        let cache = TieredCache::new(L1Cache::new(100, Duration::from_secs(60)), None, Duration::from_secs(60));

        let (value, layer) = cache
            .get_or_load::<String, _, _>("k", || async { Ok(Some("from-l3".to_string())) })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, "from-l3");
        assert_eq!(layer, CacheLayer::L3);

        let (value2, layer2) = cache
            .get_or_load::<String, _, _>("k", || async { panic!("should be served from l1 now") })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value2, "from-l3");
        assert_eq!(layer2, CacheLayer::L1);
    }

    #[tokio::test]
    async fn loader_none_is_not_cached_as_error() {
        let cache = TieredCache::new(L1Cache::new(100, Duration::from_secs(60)), None, Duration::from_secs(60));
        let result = cache.get_or_load::<String, _, _>("missing", || async { Ok(None) }).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn loader_error_propagates() {
        let cache = TieredCache::new(L1Cache::new(100, Duration::from_secs(60)), None, Duration::from_secs(60));
        let result = cache
            .get_or_load::<String, _, _>("k", || async {
                Err(ApiError::ServiceUnavailable { service: "db".to_string() })
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invalidate_removes_from_l1() {
        let cache = TieredCache::new(L1Cache::new(100, Duration::from_secs(60)), None, Duration::from_secs(60));
        cache.put("k", &42i32).await;
        cache.invalidate("k").await;
        let result = cache.get_or_load::<i32, _, _>("k", || async { Ok(None) }).await.unwrap();
        assert!(result.is_none());
    }
}
