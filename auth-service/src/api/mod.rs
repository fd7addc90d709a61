//! # API Layer
//!
//! The API layer handles HTTP request/response processing for authentication
//! endpoints. It bridges the HTTP world with the service layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            HTTP Request                                 │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Routes (routes.rs)                             │
//! │  Define URL patterns and HTTP methods, map to handlers                  │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Handlers (handlers.rs)                           │
//! │  1. Extract request data (JSON body, headers, path params)              │
//! │  2. Validate input using DTOs                                           │
//! │  3. Call service layer                                                  │
//! │  4. Transform response                                                  │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          DTOs (dto.rs)                                  │
//! │  - Request validation (serde, validator)                                │
//! │  - Response serialization                                               │
//! │  - API contract definitions                                             │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! | Module       | Responsibility                                      |
//! |--------------|-----------------------------------------------------|
//! | `routes`     | Route definitions with actix-web's `configure()`    |
//! | `handlers`   | Request handlers (extractors → service → response)  |
//! | `dto`        | Data Transfer Objects for request/response          |
//!
//! ## Endpoint Summary
//!
//! | Method | Path                    | Handler            | Auth |
//! |--------|-------------------------|---------------------|------|
//! | GET    | `/oauth/authorize`      | `oauth_authorize`   | Session cookie |
//! | POST   | `/oauth/token`          | `oauth_token`       | No (credential is the grant) |
//! | POST   | `/oauth/revoke`         | `oauth_revoke`      | No   |
//! | POST   | `/oauth/introspect`     | `oauth_introspect`  | No   |
//! | POST   | `/v1/auth/login`        | `login`             | No   |
//! | POST   | `/v1/auth/logout`       | `logout`            | Session cookie |
//! | GET    | `/v1/auth/session`      | `get_session`       | Session cookie |
//! | POST   | `/v1/auth/verify`       | `verify`            | No (credential is verified) |
//! | POST   | `/v1/api-keys`          | `create_api_key`    | Yes  |
//! | GET    | `/v1/api-keys`          | `list_api_keys`     | Yes  |
//! | POST   | `/v1/api-keys/{id}/rotate` | `rotate_api_key` | Yes  |
//! | DELETE | `/v1/api-keys/{id}`     | `revoke_api_key`    | Yes  |
//! | GET    | `/health`               | `health_check`      | No   |
//!
//! ## Related Documentation
//!
//! - Service layer: [`crate::service`]
//! - Error responses: [`shared::errors::ApiError`]
//! - Identity resolution across all four credential modalities: [`crate::service::uai_service`]

pub mod dto;
pub mod handlers;
pub mod routes;
