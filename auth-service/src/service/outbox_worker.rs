//! # Outbox Delivery Worker
//!
//! A long-running background task that drains `outbox_entries` to the
//! external projection target (§4.3, §4.11). Delivery is at-least-once: a
//! row is claimed, POSTed, and marked `sent` on success or rescheduled with
//! exponential backoff on failure, dead-lettering once `max_attempts` is
//! exceeded. Consumers on the receiving end must dedupe by `event_id` (§5).

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use shared::config::OutboxConfig;
use shared::errors::ApiError;
use sqlx::PgPool;
use std::time::Duration;

use crate::repository::outbox_repository::{self, OutboxStats};

/// Per-delivery-attempt timeout, independent of any originating HTTP
/// request (§5 cancellation & timeouts).
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct OutboxWorker {
    pool: PgPool,
    http: Client,
    config: OutboxConfig,
}

impl OutboxWorker {
    pub fn new(pool: PgPool, config: OutboxConfig) -> Self {
        let http = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self { pool, http, config }
    }

    /// Runs forever, polling for due rows every `poll_interval_ms` (§5
    /// backpressure - bounded batches per tick so this never starves online
    /// traffic competing for the same connection pool). Intended to be
    /// spawned once at startup via `tokio::spawn` and never awaited.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        loop {
            interval.tick().await;
            if let Err(error) = self.tick().await {
                tracing::error!(%error, "outbox worker tick failed");
            }
        }
    }

    /// Claims and attempts delivery of one batch. Each row's claim and
    /// terminal update happen in the same transaction (`FOR UPDATE SKIP
    /// LOCKED` in `fetch_pending`), but the HTTP delivery itself happens
    /// outside any transaction - an outbound call must never hold a
    /// database connection open for its duration.
    pub async fn tick(&self) -> Result<usize, ApiError> {
        let now = Utc::now();
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
        let entries = outbox_repository::fetch_pending(&mut conn, self.config.batch_size, now).await?;
        drop(conn);

        let delivered = entries.len();
        for entry in entries {
            let result = self
                .http
                .post(&self.config.projection_target)
                .json(&serde_json::json!({ "event_id": entry.event_id, "payload": entry.payload }))
                .send()
                .await;

            let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
            match result {
                Ok(response) if response.status().is_success() => {
                    outbox_repository::mark_sent(&mut conn, entry.id, Utc::now()).await?;
                }
                Ok(response) => {
                    let status = response.status();
                    self.record_failure(&mut conn, entry.id, entry.attempts, &format!("http status {status}"))
                        .await?;
                }
                Err(error) => {
                    self.record_failure(&mut conn, entry.id, entry.attempts, &truncate(&error.to_string()))
                        .await?;
                }
            }
        }

        Ok(delivered)
    }

    /// Advances `attempts`, computes the next backoff window
    /// (`delay(attempts) = min(base * 2^attempts, cap)`, §4.3), and
    /// dead-letters once `max_attempts` is reached.
    async fn record_failure(
        &self,
        conn: &mut sqlx::PgConnection,
        id: uuid::Uuid,
        prior_attempts: i32,
        error: &str,
    ) -> Result<(), ApiError> {
        let attempts = prior_attempts + 1;
        let dead_letter = attempts >= self.config.max_attempts;
        let delay_seconds = (self.config.base_delay_seconds * 2i64.pow(attempts.max(0) as u32))
            .min(self.config.max_delay_seconds);
        let next_attempt_at = Utc::now() + ChronoDuration::seconds(delay_seconds);

        outbox_repository::mark_failed(conn, id, error, next_attempt_at, dead_letter).await
    }

    /// Outbox health snapshot for `/health` (§6).
    pub async fn stats(&self) -> Result<OutboxStats, ApiError> {
        let mut conn = self.pool.acquire().await.map_err(ApiError::DatabaseError)?;
        outbox_repository::stats(&mut conn, Utc::now()).await
    }
}

/// Caps a stored error message so a pathological upstream response body
/// never bloats the `outbox_entries.last_error` column.
fn truncate(message: &str) -> String {
    const MAX_LEN: usize = 500;
    if message.len() <= MAX_LEN {
        message.to_string()
    } else {
        format!("{}...", &message[..MAX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_messages_untouched() {
        assert_eq!(truncate("boom"), "boom");
    }

    #[test]
    fn truncate_caps_long_messages() {
        let long = "x".repeat(1000);
        let truncated = truncate(&long);
        assert!(truncated.len() < long.len());
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn backoff_delay_is_capped() {
        let base = 2i64;
        let cap = 60i64;
        let delay = |attempts: i32| (base * 2i64.pow(attempts as u32)).min(cap);
        assert_eq!(delay(0), 2);
        assert_eq!(delay(1), 4);
        assert_eq!(delay(10), 60);
    }
}
