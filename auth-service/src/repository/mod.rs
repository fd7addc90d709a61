//! # Repository Layer
//!
//! Data access for the authentication gateway. Every function here is a
//! free `async fn` taking `conn: &mut PgConnection` as its first argument,
//! not a struct holding a `PgPool` - a deliberate generalization from the
//! single-pool-per-repository style, because §4.2 requires every
//! state-changing operation (consume code + issue tokens + append event +
//! enqueue outbox) to run inside one transaction. `sqlx::Transaction<'_,
//! Postgres>` and a pooled connection from `pool.acquire()` both deref to
//! `PgConnection`, so the same function composes standalone or as one step
//! of a larger transaction without a second code path.
//!
//! ## Modules
//!
//! | Module                    | Table(s)                          |
//! |----------------------------|-----------------------------------|
//! | `oauth_client_repository`  | `oauth_clients`                   |
//! | `auth_code_repository`     | `oauth_authorization_codes`       |
//! | `oauth_token_repository`   | `oauth_tokens`                    |
//! | `session_repository`       | `sessions`                         |
//! | `api_key_repository`       | `api_keys`                         |
//! | `user_account_repository`  | `user_accounts`                    |
//! | `event_repository`         | `events`                            |
//! | `outbox_repository`        | `outbox_entries`                   |
//! | `audit_repository`         | `audit_log`, `oauth_audit_log`     |
//! | `oauth_state_repository`   | `oauth_states`                     |
//!
//! ## Error Handling
//!
//! Database errors are mapped to [`shared::errors::ApiError`] for consistent
//! HTTP responses; constraint violations are inspected via
//! `db_err.constraint()` and translated to `ApiError::Conflict` where the
//! conflict is meaningful to a caller (duplicate client id, duplicate active
//! API key name).

pub mod api_key_repository;
pub mod audit_repository;
pub mod auth_code_repository;
pub mod event_repository;
pub mod oauth_client_repository;
pub mod oauth_state_repository;
pub mod oauth_token_repository;
pub mod outbox_repository;
pub mod session_repository;
pub mod user_account_repository;
