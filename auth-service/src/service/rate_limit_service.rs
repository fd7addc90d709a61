//! # Rate Limiting
//!
//! Sliding-window request counters keyed by `{remote_ip}`, `{client_id}`, or
//! `{user_id}` depending on endpoint class (§4.8). The durable-KV sliding
//! window itself lives in [`shared::redis_client::RedisClient::rate_limit_check`];
//! this module adds the in-process fallback for when no L2 is configured and
//! the fail-open policy that applies regardless of which backing store is in
//! use.

use shared::config::RateLimitConfig;
use shared::redis_client::RedisClient;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Result of a rate-limit check. `reset_time_ms` is the epoch millisecond at
/// which the oldest counted request ages out of the window - surfaced to
/// the HTTP layer as 429 response metadata.
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub current_count: i64,
    pub reset_time_ms: i64,
}

/// An in-process sliding window over a single bucket, used only when no
/// durable KV is configured. Bounded by the same window as the durable
/// implementation; entries older than the window are pruned on each check.
struct LocalWindow {
    timestamps: Mutex<VecDeque<i64>>,
}

impl LocalWindow {
    fn new() -> Self {
        Self { timestamps: Mutex::new(VecDeque::new()) }
    }

    fn check(&self, now_ms: i64, window_ms: i64, max_requests: i64) -> (bool, i64) {
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        let window_start = now_ms - window_ms;
        while timestamps.front().is_some_and(|&t| t < window_start) {
            timestamps.pop_front();
        }

        if timestamps.len() as i64 >= max_requests {
            return (false, timestamps.len() as i64);
        }

        timestamps.push_back(now_ms);
        (true, timestamps.len() as i64)
    }
}

/// Backs `/oauth/*`, `/v1/auth/*`, and API-key-protected endpoints with a
/// sliding-window limiter. Durable KV (L2) is preferred when configured;
/// otherwise an in-process map of per-bucket windows is used. Either way, a
/// backing-store failure fails open - availability over strict denial
/// (§4.8, a deliberate trade).
#[derive(Clone)]
pub struct RateLimitService {
    redis: Option<RedisClient>,
    local: Arc<Mutex<HashMap<String, Arc<LocalWindow>>>>,
    config: RateLimitConfig,
}

impl RateLimitService {
    pub fn new(redis: Option<RedisClient>, config: RateLimitConfig) -> Self {
        Self { redis, local: Arc::new(Mutex::new(HashMap::new())), config }
    }

    /// Checks and records one request against `bucket` (e.g.
    /// `"oauth_token:{client_id}"`, `"login:{remote_ip}"`). `now_ms` is
    /// supplied by the caller so the check stays deterministic and testable.
    pub async fn check(&self, bucket: &str, now_ms: i64) -> RateLimitOutcome {
        let window_ms = self.config.window_ms;
        let max_requests = self.config.max_requests;
        let reset_time_ms = now_ms + window_ms;

        if let Some(redis) = &self.redis {
            let member = format!("{now_ms}-{}", Uuid::new_v4());
            match redis.rate_limit_check(bucket, now_ms, window_ms, max_requests, &member).await {
                Ok((allowed, current_count)) => {
                    return RateLimitOutcome { allowed, current_count, reset_time_ms };
                }
                Err(error) => {
                    tracing::warn!(%bucket, %error, "rate limit backing store failed, failing open");
                    return RateLimitOutcome { allowed: true, current_count: 0, reset_time_ms };
                }
            }
        }

        let window = {
            let mut buckets = self.local.lock().unwrap_or_else(|e| e.into_inner());
            buckets.entry(bucket.to_string()).or_insert_with(|| Arc::new(LocalWindow::new())).clone()
        };
        let (allowed, current_count) = window.check(now_ms, window_ms, max_requests);
        RateLimitOutcome { allowed, current_count, reset_time_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig { window_ms: 1_000, max_requests: 3 }
    }

    #[tokio::test]
    async fn local_window_allows_up_to_the_limit_then_denies() {
        let service = RateLimitService::new(None, config());
        let now = 1_000_000;

        for _ in 0..3 {
            let outcome = service.check("bucket-a", now).await;
            assert!(outcome.allowed);
        }

        let denied = service.check("bucket-a", now).await;
        assert!(!denied.allowed);
    }

    #[tokio::test]
    async fn local_window_evicts_old_entries() {
        let service = RateLimitService::new(None, config());

        for _ in 0..3 {
            assert!(service.check("bucket-b", 0).await.allowed);
        }
        assert!(!service.check("bucket-b", 500).await.allowed);
        // past the window, the earliest timestamp has aged out
        assert!(service.check("bucket-b", 1_001).await.allowed);
    }

    #[tokio::test]
    async fn distinct_buckets_are_independent() {
        let service = RateLimitService::new(None, config());
        for _ in 0..3 {
            assert!(service.check("a", 0).await.allowed);
        }
        assert!(service.check("b", 0).await.allowed);
    }
}
