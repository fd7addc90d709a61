//! # Service Layer
//!
//! Business logic for the four credential modalities the gateway issues and
//! validates, plus the cross-cutting concerns every one of them shares.
//!
//! | Module                | Responsibility                                                    |
//! |------------------------|--------------------------------------------------------------------|
//! | [`oauth_service`]      | OAuth2/PKCE authorize, token grants, rotation, revoke, introspect   |
//! | [`session_service`]    | Browser session create/touch/revoke, cookie-backed (§4.6)           |
//! | [`api_key_service`]    | Opaque API key mint/rotate/revoke/validate (§4.7)                   |
//! | [`rate_limit_service`] | Sliding-window request throttling (§4.8)                            |
//! | [`uai_service`]        | Universal Auth Identifier resolution across all four modalities     |
//! | [`outbox_worker`]      | Background delivery of queued events to the external projection     |
//! | [`event_log`]          | Pairs an event append with its outbox row in one transaction        |
//!
//! Repositories take `&mut PgConnection` rather than holding a pool, so every
//! service composes its own transactions instead of delegating that choice
//! downward (§9 Design Note).

pub mod api_key_service;
pub mod event_log;
pub mod oauth_service;
pub mod outbox_worker;
pub mod rate_limit_service;
pub mod session_service;
pub mod uai_service;

pub use api_key_service::ApiKeyService;
pub use oauth_service::OAuthService;
pub use rate_limit_service::RateLimitService;
pub use session_service::SessionService;
pub use uai_service::UaiService;
