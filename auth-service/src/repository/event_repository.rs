//! # Event Repository
//!
//! Typed access to the append-only `events` table (§3, §4.3). [`append`] is
//! the only write path: it computes the next per-aggregate version under
//! `SELECT ... FOR UPDATE` and inserts in the same statement's transaction,
//! so the caller must already be inside one (auth-code consumption, token
//! issuance, session/api-key mutations all wrap this in a single
//! `sqlx::Transaction`).
//!
//! `EventPayload` is a closed tagged enum in the domain layer; this is the
//! one place it crosses into `serde_json::Value` for the JSONB column (§9
//! Design Note).

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::domain::events::{AggregateType, Event, EventPayload, NewEvent, EVENT_TYPE_VERSION};

/// Appends one event, computing its per-aggregate version under row lock.
/// The lock is taken via a dummy advisory-style `SELECT ... FOR UPDATE`
/// against the existing rows for this aggregate; if none exist yet the
/// first append simply proceeds unlocked (nothing to contend with).
pub async fn append(conn: &mut PgConnection, new: NewEvent) -> Result<Event, ApiError> {
    let aggregate_type = new.payload.aggregate_type();
    let event_type = new.payload.event_type();
    let payload_json = serde_json::to_value(&new.payload).map_err(|e| ApiError::InternalError {
        message: format!("failed to serialize event payload: {e}"),
    })?;

    let next_version: i64 = sqlx::query(
        "SELECT COALESCE(MAX(version), 0) + 1 AS next_version FROM events \
         WHERE aggregate_type = $1 AND aggregate_id = $2 FOR UPDATE",
    )
    .bind(aggregate_type)
    .bind(new.aggregate_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)?
    .try_get("next_version")
    .map_err(ApiError::DatabaseError)?;

    let row = sqlx::query(
        "INSERT INTO events \
         (event_id, aggregate_type, aggregate_id, version, event_type, event_type_version, \
          payload, metadata, occurred_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now()) \
         RETURNING event_id, occurred_at",
    )
    .bind(Uuid::new_v4())
    .bind(aggregate_type)
    .bind(new.aggregate_id)
    .bind(next_version)
    .bind(event_type)
    .bind(EVENT_TYPE_VERSION)
    .bind(&payload_json)
    .bind(&new.metadata)
    .fetch_one(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)?;

    let event_id: Uuid = row.try_get("event_id").map_err(ApiError::DatabaseError)?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(ApiError::DatabaseError)?;

    Ok(Event {
        event_id,
        aggregate_type,
        aggregate_id: new.aggregate_id,
        version: next_version,
        event_type: event_type.to_string(),
        event_type_version: EVENT_TYPE_VERSION,
        payload: new.payload,
        metadata: new.metadata,
        occurred_at,
    })
}

/// Replays the event stream for one aggregate in version order. Used for
/// debugging and the audit surface, not on any hot path.
pub async fn list_by_aggregate(
    conn: &mut PgConnection,
    aggregate_type: AggregateType,
    aggregate_id: Uuid,
) -> Result<Vec<Event>, ApiError> {
    let rows = sqlx::query(
        "SELECT event_id, aggregate_type, aggregate_id, version, event_type, event_type_version, \
         payload, metadata, occurred_at FROM events \
         WHERE aggregate_type = $1 AND aggregate_id = $2 ORDER BY version ASC",
    )
    .bind(aggregate_type)
    .bind(aggregate_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(ApiError::DatabaseError)?;

    rows.into_iter().map(row_to_event).collect()
}

fn row_to_event(row: sqlx::postgres::PgRow) -> Result<Event, ApiError> {
    let payload_json: serde_json::Value = row.try_get("payload").map_err(ApiError::DatabaseError)?;
    let payload: EventPayload = serde_json::from_value(payload_json).map_err(|e| ApiError::InternalError {
        message: format!("failed to deserialize event payload: {e}"),
    })?;

    Ok(Event {
        event_id: row.try_get("event_id").map_err(ApiError::DatabaseError)?,
        aggregate_type: row.try_get("aggregate_type").map_err(ApiError::DatabaseError)?,
        aggregate_id: row.try_get("aggregate_id").map_err(ApiError::DatabaseError)?,
        version: row.try_get("version").map_err(ApiError::DatabaseError)?,
        event_type: row.try_get("event_type").map_err(ApiError::DatabaseError)?,
        event_type_version: row.try_get("event_type_version").map_err(ApiError::DatabaseError)?,
        payload,
        metadata: row.try_get("metadata").map_err(ApiError::DatabaseError)?,
        occurred_at: row.try_get("occurred_at").map_err(ApiError::DatabaseError)?,
    })
}
