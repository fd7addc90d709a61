//! # Redis Client for Caching and Rate Limiting
//!
//! High-level Redis client used as the L2 tier of the UAI cache (§4.4) and
//! as the backing store for sliding-window rate limiting (§4.8).
//!
//! ## Why Redis?
//!
//! | Use Case | Description |
//! |----------|-------------|
//! | **L2 cache** | Durable KV tier between the in-process L1 cache and Postgres |
//! | **Rate limiting** | Sliding-window request counters per client/IP |
//!
//! ## Connection Management
//!
//! We use a `ConnectionManager` which automatically reconnects on failure.
//! This is more resilient than a simple connection for long-running services.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Redis Client                                   │
//! ├───────────────────────────────────────────────────────────────────┤
//! │                                                                    │
//! │  ┌──────────────────┐                                             │
//! │  │ ConnectionManager │ ──── Auto-reconnect on failure             │
//! │  └────────┬─────────┘                                             │
//! │           │                                                        │
//! │           ▼                                                        │
//! │  ┌─────────────────┐                                              │
//! │  │   Redis Server   │                                              │
//! │  └─────────────────┘                                              │
//! │                                                                    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Naming Convention
//!
//! | Pattern | Example | Purpose |
//! |---------|---------|---------|
//! | `uai:{method}:{credential_hash}` | `uai:api_key:ab12...` | L2 identity cache entry |
//! | `ratelimit:{bucket}` | `ratelimit:client:abc123` | Sliding-window request log |
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::redis_client::RedisClient;
//! use shared::config::AppConfig;
//! use std::time::Duration;
//!
//! let config = AppConfig::from_env()?;
//! let redis = RedisClient::new(&config.redis).await?;
//!
//! redis.set("uai:api_key:abc", &resolved, Some(Duration::from_secs(300))).await?;
//! let cached: Option<ResolvedIdentity> = redis.get("uai:api_key:abc").await?;
//! ```
//!
//! ## Related Documentation
//!
//! - [`crate::config::RedisConfig`] - Connection configuration

use crate::config::RedisConfig;
use crate::errors::ApiError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

// =============================================================================
// Redis Client
// =============================================================================

/// Async Redis client with automatic reconnection.
///
/// This client wraps a `ConnectionManager` which handles connection
/// failures automatically. It's safe to clone and share across tasks.
///
/// ## Thread Safety
///
/// The client is `Clone + Send + Sync`. Cloning is cheap (just an Arc clone).
/// Each operation uses an async connection from the manager.
#[derive(Clone)]
pub struct RedisClient {
    /// Connection manager for automatic reconnection
    conn: ConnectionManager,
}

impl RedisClient {
    /// Creates a new Redis client and establishes connection.
    ///
    /// ## Errors
    ///
    /// Returns `ApiError::RedisError` if:
    /// - URL is invalid
    /// - Redis server is unreachable
    /// - Authentication fails
    pub async fn new(config: &RedisConfig) -> Result<Self, ApiError> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str()).map_err(ApiError::RedisError)?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(ApiError::RedisError)?;

        info!("Redis connection established");

        Ok(Self { conn })
    }

    // =========================================================================
    // Basic Operations (L2 cache tier)
    // =========================================================================

    /// Stores a value with optional TTL (Time To Live).
    ///
    /// The value is serialized to JSON before storage.
    pub async fn set<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), ApiError> {
        let serialized = serde_json::to_string(value)
            .map_err(|e| ApiError::InternalError { message: e.to_string() })?;

        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                conn.set_ex::<_, _, ()>(key, &serialized, duration.as_secs())
                    .await
                    .map_err(ApiError::RedisError)?;
            }
            None => {
                conn.set::<_, _, ()>(key, &serialized)
                    .await
                    .map_err(ApiError::RedisError)?;
            }
        }

        Ok(())
    }

    /// Retrieves and deserializes a value.
    ///
    /// ## Returns
    ///
    /// - `Ok(Some(value))` - Key exists and was deserialized
    /// - `Ok(None)` - Key doesn't exist
    /// - `Err(...)` - Redis error or deserialization failed
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        let mut conn = self.conn.clone();

        let value: Option<String> = conn.get(key).await.map_err(ApiError::RedisError)?;

        match value {
            Some(s) => {
                let deserialized = serde_json::from_str(&s)
                    .map_err(|e| ApiError::InternalError { message: e.to_string() })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    /// Deletes a key. Used to invalidate L2 cache entries on revocation (§4.4).
    ///
    /// ## Returns
    ///
    /// - `true` - Key was deleted
    /// - `false` - Key didn't exist
    pub async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(ApiError::RedisError)?;
        Ok(deleted > 0)
    }

    /// Checks if a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(ApiError::RedisError)
    }

    /// Increments a counter (atomic operation). Creates the key with value 1
    /// if it doesn't exist.
    pub async fn incr(&self, key: &str) -> Result<i64, ApiError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1).await.map_err(ApiError::RedisError)
    }

    /// Sets TTL on an existing key.
    ///
    /// ## Returns
    ///
    /// - `true` - TTL was set
    /// - `false` - Key doesn't exist
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl.as_secs() as i64)
            .await
            .map_err(ApiError::RedisError)
    }

    /// Health check - verifies Redis is responding.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(ApiError::RedisError)?;
        Ok(())
    }

    // =========================================================================
    // Sliding-Window Rate Limiting (§4.8)
    // =========================================================================
    // A sorted set per bucket holds one member per request, scored by its
    // arrival timestamp (ms). Each call prunes entries older than the window,
    // then checks the remaining cardinality against the limit before adding
    // the new request - so a request that would exceed the limit is never
    // itself recorded.

    /// Records a request against `bucket` and reports whether it is allowed
    /// under a sliding window of `window_ms` milliseconds capped at
    /// `max_requests`.
    ///
    /// `now_ms` and `member` are supplied by the caller (rather than computed
    /// here) so the operation stays deterministic and testable: `member` must
    /// be unique per request (e.g. `"{now_ms}-{uuid}"`) to avoid collisions
    /// within the same millisecond.
    ///
    /// Returns `(allowed, current_count)`.
    pub async fn rate_limit_check(
        &self,
        bucket: &str,
        now_ms: i64,
        window_ms: i64,
        max_requests: i64,
        member: &str,
    ) -> Result<(bool, i64), ApiError> {
        let mut conn = self.conn.clone();
        let key = format!("ratelimit:{bucket}");
        let window_start = now_ms - window_ms;

        let _: () = conn
            .zrembyscore(&key, i64::MIN, window_start)
            .await
            .map_err(ApiError::RedisError)?;

        let count: i64 = conn.zcard(&key).await.map_err(ApiError::RedisError)?;

        if count >= max_requests {
            return Ok((false, count));
        }

        let _: () = conn
            .zadd(&key, member, now_ms)
            .await
            .map_err(ApiError::RedisError)?;
        let _: bool = conn
            .expire(&key, (window_ms / 1000).max(1))
            .await
            .map_err(ApiError::RedisError)?;

        Ok((true, count + 1))
    }
}

// Hide internal state in Debug output
impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}
