//! # Outbox Repository
//!
//! Typed access to `outbox_entries` (§3, §4.3). `enqueue` must be called in
//! the same transaction as the [`event_repository::append`] it accompanies -
//! that pairing is what gives at-least-once delivery its guarantee. The
//! delivery worker (`service::outbox_worker`) owns `fetch_pending`,
//! `mark_sent`, and `mark_failed`.
//!
//! [`event_repository::append`]: super::event_repository::append

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::errors::ApiError;
use sqlx::{FromRow, PgConnection, Row};
use uuid::Uuid;

/// A queued delivery to the external projection system.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub event_id: Uuid,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub dead_lettered: bool,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, event_id, payload, attempts, next_attempt_at, delivered_at, \
    dead_lettered, last_error, created_at";

/// Enqueues one delivery row, eligible immediately (`next_attempt_at = now()`).
pub async fn enqueue(
    conn: &mut PgConnection,
    event_id: Uuid,
    payload: serde_json::Value,
) -> Result<OutboxEntry, ApiError> {
    let query = format!(
        "INSERT INTO outbox_entries \
         (id, event_id, payload, attempts, next_attempt_at, dead_lettered, created_at) \
         VALUES ($1, $2, $3, 0, now(), false, now()) \
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, OutboxEntry>(&query)
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(payload)
        .fetch_one(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Claims up to `batch_size` due, undelivered, non-dead-lettered rows for
/// the worker's current tick (§5 backpressure - 50-row batches by default).
/// `FOR UPDATE SKIP LOCKED` lets a future multi-worker deployment run
/// concurrently without double-delivering.
pub async fn fetch_pending(
    conn: &mut PgConnection,
    batch_size: i64,
    now: DateTime<Utc>,
) -> Result<Vec<OutboxEntry>, ApiError> {
    let query = format!(
        "SELECT {COLUMNS} FROM outbox_entries \
         WHERE delivered_at IS NULL AND dead_lettered = false AND next_attempt_at <= $1 \
         ORDER BY created_at ASC LIMIT $2 FOR UPDATE SKIP LOCKED"
    );
    sqlx::query_as::<_, OutboxEntry>(&query)
        .bind(now)
        .bind(batch_size)
        .fetch_all(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)
}

pub async fn mark_sent(conn: &mut PgConnection, id: Uuid, now: DateTime<Utc>) -> Result<(), ApiError> {
    sqlx::query("UPDATE outbox_entries SET delivered_at = $2, last_error = NULL WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(ApiError::DatabaseError)?;
    Ok(())
}

/// Records a failed delivery attempt, advancing `next_attempt_at` by the
/// caller-computed backoff delay and dead-lettering once `max_attempts` is
/// exceeded (§4.3: `delay(attempts) = min(base * 2^attempts, cap)`).
pub async fn mark_failed(
    conn: &mut PgConnection,
    id: Uuid,
    error: &str,
    next_attempt_at: DateTime<Utc>,
    dead_letter: bool,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE outbox_entries SET attempts = attempts + 1, last_error = $2, \
         next_attempt_at = $3, dead_lettered = $4 WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .bind(next_attempt_at)
    .bind(dead_letter)
    .execute(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)?;
    Ok(())
}

/// Outbox health snapshot (§4.3: `{pending, failed, oldest_pending_seconds}`).
#[derive(Debug, Clone, Serialize)]
pub struct OutboxStats {
    pub pending: i64,
    pub failed: i64,
    pub oldest_pending_seconds: i64,
}

pub async fn stats(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<OutboxStats, ApiError> {
    let row = sqlx::query(
        "SELECT \
           COUNT(*) FILTER (WHERE delivered_at IS NULL AND dead_lettered = false) AS pending, \
           COUNT(*) FILTER (WHERE dead_lettered = true) AS failed, \
           COALESCE(EXTRACT(EPOCH FROM ($1 - MIN(created_at) FILTER \
             (WHERE delivered_at IS NULL AND dead_lettered = false)))::BIGINT, 0) AS oldest_pending_seconds \
         FROM outbox_entries",
    )
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)?;

    Ok(OutboxStats {
        pending: row.try_get("pending").map_err(ApiError::DatabaseError)?,
        failed: row.try_get("failed").map_err(ApiError::DatabaseError)?,
        oldest_pending_seconds: row.try_get("oldest_pending_seconds").map_err(ApiError::DatabaseError)?,
    })
}
