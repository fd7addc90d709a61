//! # Auth Gateway - Shared Library
//!
//! Ambient infrastructure shared by the gateway binary: configuration,
//! error types, crypto primitives, database/Redis clients, tracing setup,
//! and request validation. The gateway-specific domain (OAuth clients,
//! sessions, API keys, UAI resolution) lives in the `auth-service` crate;
//! this crate only holds what a second credential-handling service in the
//! same deployment would also need.
//!
//! ## Modules
//!
//! | Module | Purpose | Key Types |
//! |--------|---------|-----------|
//! | [`config`] | Environment-based configuration | [`AppConfig`] |
//! | [`errors`] | Standardized error handling | [`ApiError`], [`ApiResult`] |
//! | [`crypto`] | Opaque token generation, hashing, PKCE | [`crypto::generate_opaque_token`] |
//! | [`auth`] | Decoding externally-issued JWTs | [`auth::JwtDecoder`] |
//! | [`database`] | PostgreSQL connection pool | [`create_pool`](database::create_pool) |
//! | [`redis_client`] | Redis for caching & rate limiting | [`RedisClient`] |
//! | [`tracing_config`] | Structured logging setup | [`init_tracing`](tracing_config::init_tracing) |
//! | [`validation`] | Request validation helpers | Custom validators |
//!
//! ## Design Decisions
//!
//! 1. **Single source of truth**: All shared types live here to prevent drift
//! 2. **Framework agnostic where possible**: Core logic works with both Actix-web and Axum
//! 3. **Security first**: no plaintext secrets at rest, constant-time comparisons
//! 4. **Observable by default**: Structured logging and tracing built-in

pub mod auth;
pub mod config;
pub mod crypto;
pub mod database;
pub mod errors;
pub mod redis_client;
pub mod tracing_config;
pub mod validation;

// Re-exports for convenience - import commonly used types directly from `shared`
pub use config::AppConfig;
pub use errors::{ApiError, ApiResult};

