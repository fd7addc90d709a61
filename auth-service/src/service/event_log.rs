//! # Event + Outbox Pairing
//!
//! Every engine that mutates an aggregate appends one [`Event`] and enqueues
//! one outbox row in the same transaction (§4.3) - that pairing, not either
//! table alone, is what gives the external projection at-least-once delivery.
//! [`record`] is the one place that pairing happens so no engine can append
//! an event and forget the outbox row (or the reverse).

use shared::errors::ApiError;
use sqlx::PgConnection;

use crate::domain::events::{Event, NewEvent};
use crate::repository::{event_repository, outbox_repository};

pub async fn record(conn: &mut PgConnection, new: NewEvent) -> Result<Event, ApiError> {
    let event = event_repository::append(conn, new).await?;
    let payload = serde_json::to_value(&event.payload).map_err(|e| ApiError::InternalError {
        message: format!("failed to serialize outbox payload: {e}"),
    })?;
    outbox_repository::enqueue(conn, event.event_id, payload).await?;
    Ok(event)
}
