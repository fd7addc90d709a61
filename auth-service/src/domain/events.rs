//! # Domain Events
//!
//! Append-only event log entries (§3, §4.3). Every state-changing operation
//! in an engine appends exactly one [`Event`] in the same transaction as the
//! mutation, then enqueues an outbox row for the external projection.
//!
//! ## Why a tagged enum and not `serde_json::Value`
//!
//! [`EventPayload`] is a closed, tagged union so engine code never handles
//! untyped JSON internally (§9 Design Notes). `serde_json::Value` only
//! appears at the repository boundary, where the tagged enum is serialized
//! into (and parsed back out of) the `payload` JSONB column.
//!
//! ## Versioning
//!
//! `version` is the monotonic per-aggregate sequence number described in
//! §3: the repository computes `COALESCE(MAX(version), 0) + 1` under
//! `SELECT ... FOR UPDATE` in the same transaction as the insert, so two
//! concurrent appends for the same aggregate can never observe the same
//! next version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entities::{Platform, RevokedReason, TokenType};

/// Which entity an [`Event`] describes a change to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    User,
    Client,
    Session,
    Token,
    ApiKey,
}

impl AggregateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Client => "client",
            Self::Session => "session",
            Self::Token => "token",
            Self::ApiKey => "api_key",
        }
    }
}

/// Current schema version for every [`EventPayload`] variant.
///
/// Bump this (and add a new variant, e.g. `SessionCreatedV2`) if a payload
/// shape ever needs to change in a way downstream projections must branch
/// on; nothing in this gateway requires that yet.
pub const EVENT_TYPE_VERSION: i32 = 1;

/// The structured body of a domain event, internally tagged on
/// `event_type` so the wire/JSONB representation carries its own
/// discriminant without a separate lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    SessionCreated {
        session_id: Uuid,
        user_id: Uuid,
        platform: Platform,
    },
    SessionRevoked {
        session_id: Uuid,
    },
    UserUpserted {
        user_id: Uuid,
        email: String,
    },
    TokenIssued {
        token_id: Uuid,
        token_type: TokenType,
        client_id: String,
        parent_token_id: Option<Uuid>,
    },
    TokenRevoked {
        token_id: Uuid,
        reason: RevokedReason,
    },
    AuthorizationCodeConsumed {
        code_id: Uuid,
        client_id: String,
    },
    AuthorizationCodeReplayed {
        code_id: Uuid,
        client_id: String,
    },
    ApiKeyCreated {
        api_key_id: Uuid,
        user_id: Uuid,
    },
    ApiKeyRotated {
        api_key_id: Uuid,
    },
    ApiKeyRevoked {
        api_key_id: Uuid,
    },
    /// Catch-all for audit-style records that don't warrant their own
    /// variant (login attempts, introspection of an unknown token, etc).
    AuthEventLogged {
        event: String,
        success: bool,
    },
}

impl EventPayload {
    /// The `event_type` discriminant string, matching the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "SessionCreated",
            Self::SessionRevoked { .. } => "SessionRevoked",
            Self::UserUpserted { .. } => "UserUpserted",
            Self::TokenIssued { .. } => "TokenIssued",
            Self::TokenRevoked { .. } => "TokenRevoked",
            Self::AuthorizationCodeConsumed { .. } => "AuthorizationCodeConsumed",
            Self::AuthorizationCodeReplayed { .. } => "AuthorizationCodeReplayed",
            Self::ApiKeyCreated { .. } => "ApiKeyCreated",
            Self::ApiKeyRotated { .. } => "ApiKeyRotated",
            Self::ApiKeyRevoked { .. } => "ApiKeyRevoked",
            Self::AuthEventLogged { .. } => "AuthEventLogged",
        }
    }

    /// Which aggregate this payload's events are versioned against.
    pub fn aggregate_type(&self) -> AggregateType {
        match self {
            Self::SessionCreated { .. } | Self::SessionRevoked { .. } => AggregateType::Session,
            Self::UserUpserted { .. } => AggregateType::User,
            Self::TokenIssued { .. } | Self::TokenRevoked { .. } => AggregateType::Token,
            Self::AuthorizationCodeConsumed { .. } | Self::AuthorizationCodeReplayed { .. } => {
                AggregateType::Client
            }
            Self::ApiKeyCreated { .. } | Self::ApiKeyRotated { .. } | Self::ApiKeyRevoked { .. } => {
                AggregateType::ApiKey
            }
            Self::AuthEventLogged { .. } => AggregateType::User,
        }
    }
}

/// An immutable append-only event record (§3).
#[derive(Debug, Clone)]
pub struct Event {
    pub event_id: Uuid,
    pub aggregate_type: AggregateType,
    pub aggregate_id: Uuid,
    pub version: i64,
    pub event_type: String,
    pub event_type_version: i32,
    pub payload: EventPayload,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Fields required to append a new [`Event`]. `aggregate_id` is supplied
/// separately from the payload since not every payload variant carries an
/// id that is itself the aggregate id (e.g. `AuthEventLogged` against a
/// user aggregate keyed by `user_id`).
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub aggregate_id: Uuid,
    pub payload: EventPayload,
    pub metadata: serde_json::Value,
}

impl NewEvent {
    pub fn new(aggregate_id: Uuid, payload: EventPayload) -> Self {
        Self { aggregate_id, payload, metadata: serde_json::json!({}) }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_serde_tag() {
        let payload = EventPayload::SessionRevoked { session_id: Uuid::nil() };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["event_type"], "SessionRevoked");
        assert_eq!(payload.event_type(), "SessionRevoked");
    }

    #[test]
    fn aggregate_type_strings() {
        assert_eq!(AggregateType::ApiKey.as_str(), "api_key");
        assert_eq!(AggregateType::User.as_str(), "user");
    }

    #[test]
    fn token_issued_aggregates_on_token() {
        let payload = EventPayload::TokenIssued {
            token_id: Uuid::nil(),
            token_type: TokenType::Access,
            client_id: "cli".into(),
            parent_token_id: None,
        };
        assert_eq!(payload.aggregate_type(), AggregateType::Token);
    }
}
