//! # Domain Layer
//!
//! The domain layer contains the core business entities and domain events
//! for the authentication service. This layer is **framework-agnostic** and
//! represents the heart of the business logic.
//!
//! ## Clean Architecture Principles
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         Domain Layer                              │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │                       Entities                              │  │
//! │  │  - OAuthClient / AuthorizationCode / OAuthToken              │  │
//! │  │  - Session / ApiKey / UserAccount                            │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! │                                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │                     Domain Events                           │  │
//! │  │  - SessionCreated / SessionRevoked                           │  │
//! │  │  - TokenIssued / TokenRevoked                                │  │
//! │  │  - UserUpserted / ApiKeyCreated / ApiKeyRotated / ...        │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! │                                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │                   Transient OAuth State                     │  │
//! │  │  - CSRF tokens, device codes, OTP states (L3 tier)           │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! | Module        | Purpose                                           |
//! |---------------|---------------------------------------------------|
//! | `entities`    | Core domain entities mapped to database tables    |
//! | `events`      | Append-only event log entries                     |
//! | `oauth_state` | Transient key→blob state backing the L3 cache tier|
//!
//! ## Design Decisions
//!
//! 1. **Entities vs DTOs**: Domain entities contain all database fields,
//!    while separate DTOs in the API layer handle request/response transformation.
//!
//! 2. **`FromRow` Derive**: Entities use sqlx's `FromRow` for automatic
//!    mapping from database rows, reducing boilerplate.
//!
//! 3. **No untyped blobs in engine logic**: event payloads are a closed
//!    tagged enum; `serde_json::Value` only appears at the repository
//!    boundary (§9 Design Notes).

pub mod entities;
pub mod events;
pub mod oauth_state;

pub use entities::*;
