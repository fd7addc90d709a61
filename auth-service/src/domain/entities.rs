//! # Authentication Gateway Domain Entities
//!
//! Core persistent entities for the four credential modalities the gateway
//! issues and validates: OAuth2/PKCE, opaque API keys, browser sessions, and
//! the user accounts every credential ultimately resolves to.
//!
//! ## Entity Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Domain Entities                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐   issues    ┌────────────────────┐                 │
//! │  │   OAuthClient   │────────────▶│  AuthorizationCode  │                 │
//! │  └─────────────────┘             └──────────┬──────────┘                │
//! │                                              │ consumed → issues        │
//! │                                              ▼                          │
//! │                                    ┌────────────────────┐               │
//! │                                    │     OAuthToken      │◀─ self-ref   │
//! │                                    │ (access / refresh)  │  parent_token │
//! │                                    └────────────────────┘               │
//! │                                                                         │
//! │  ┌─────────────────┐             ┌────────────────────┐                 │
//! │  │     Session      │             │       ApiKey        │                │
//! │  └─────────────────┘             └────────────────────┘                 │
//! │                                                                         │
//! │                      all resolve to a ┌───────────────┐                 │
//! │                                        │  UserAccount   │                │
//! │                                        └───────────────┘                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Entity Types
//!
//! | Entity              | Table                    | Purpose                              |
//! |----------------------|--------------------------|---------------------------------------|
//! | [`OAuthClient`]      | `oauth_clients`          | Registered OAuth2 client application  |
//! | [`AuthorizationCode`]| `oauth_authorization_codes` | One-time PKCE authorization code   |
//! | [`OAuthToken`]       | `oauth_tokens`           | Opaque access/refresh token          |
//! | [`Session`]          | `sessions`               | Browser session (cookie-backed)       |
//! | [`ApiKey`]           | `api_keys`               | Server-to-server bearer credential    |
//! | [`UserAccount`]      | `user_accounts`          | Canonical identity every credential resolves to |
//!
//! ## Security Considerations
//!
//! - Every credential-bearing entity stores `*_hash` only - the plain secret
//!   is returned to the caller exactly once and never persisted.
//! - No salt is used (§4.1): hashes are deterministic `SHA256(secret)` so
//!   validation is a lookup by hash, not a per-row verify.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// OAUTH CLIENT
// =============================================================================

/// Whether a client can hold a confidential secret or must rely on PKCE alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Public,
    Confidential,
}

/// Administrative status of a registered OAuth client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Disabled,
}

/// A registered OAuth2 client application (§3).
///
/// *Invariant*: if `require_pkce` is true, `"S256"` must appear in
/// `allowed_code_challenge_methods` - enforced at provisioning time, not
/// re-checked on every request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Case-insensitive unique client identifier (compared lowercased).
    pub client_id: String,
    pub client_type: ClientType,
    /// Free-form application category, e.g. `"cli"`, `"mcp"`, `"web"`.
    pub application_type: String,
    pub require_pkce: bool,
    pub allowed_code_challenge_methods: Vec<String>,
    /// Exact-string match set; never normalized (§4.5 tie-breaks).
    pub allowed_redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub default_scopes: Vec<String>,
    pub status: ClientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthClient {
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }
}

/// Fields required to provision a new [`OAuthClient`]. Clients are created
/// out-of-band (§3 lifecycle) - this exists for seeding and admin tooling,
/// not a public HTTP endpoint.
#[derive(Debug, Clone)]
pub struct NewOAuthClient {
    pub client_id: String,
    pub client_type: ClientType,
    pub application_type: String,
    pub require_pkce: bool,
    pub allowed_code_challenge_methods: Vec<String>,
    pub allowed_redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub default_scopes: Vec<String>,
}

// =============================================================================
// AUTHORIZATION CODE
// =============================================================================

/// A one-time PKCE authorization code (§3, §4.5).
///
/// *Invariant*: at most one successful consumption; the plain code is never
/// stored, only `code_hash = SHA256(code)`.
#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationCode {
    pub id: Uuid,
    pub code_hash: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub code_challenge: String,
    /// Always `"S256"` per §4.1 - `plain` is never stored even when a client
    /// has it enabled, since PKCE enforcement requires it on issuance only.
    pub code_challenge_method: String,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub state: String,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Root refresh token issued on successful consumption, recorded so a
    /// replay of this code can find and revoke the entire derived chain
    /// (§8 testable property: code replay revokes R1 and thereby A1).
    pub issued_refresh_token_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Fields required to issue a new [`AuthorizationCode`].
#[derive(Debug, Clone)]
pub struct NewAuthorizationCode {
    pub code_hash: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub state: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// OAUTH TOKEN (ACCESS / REFRESH)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Why a token was revoked. Distinguishing reasons lets audit trails tell
/// routine rotation apart from a detected replay attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RevokedReason {
    Expired,
    /// This refresh token was replaced by a newer one during rotation.
    Rotated,
    /// A refresh ancestor further up the chain was rotated or revoked.
    AncestorRotated,
    /// Explicit `/oauth/revoke` call, or replay defense firing.
    Revoked,
}

/// An opaque OAuth2 access or refresh token (§3, §4.5).
///
/// Tokens form a tree keyed by `parent_token_id`: an access token's parent is
/// the refresh that issued it; a refresh token's parent is the prior refresh
/// it replaced during rotation. Revoking any node revokes its whole subtree
/// (§9 design note - no true cycle, just a directed tree).
#[derive(Debug, Clone, FromRow)]
pub struct OAuthToken {
    pub id: Uuid,
    pub token_hash: String,
    pub token_type: TokenType,
    pub client_id: String,
    pub user_id: Uuid,
    pub scope: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<RevokedReason>,
    pub parent_token_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl OAuthToken {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now <= self.expires_at
    }
}

/// Fields required to issue a new [`OAuthToken`].
#[derive(Debug, Clone)]
pub struct NewOAuthToken {
    pub token_hash: String,
    pub token_type: TokenType,
    pub client_id: String,
    pub user_id: Uuid,
    pub scope: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub parent_token_id: Option<Uuid>,
}

// =============================================================================
// SESSION (BROWSER)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Mcp,
    Cli,
    Api,
}

/// A browser (or first-party client) session backed by an opaque cookie
/// value (§4.6). Both the session token and its refresh counterpart are
/// stored hashed, same as OAuth tokens.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub token_hash: String,
    pub refresh_token_hash: Option<String>,
    pub client_id: Option<String>,
    pub scope: Vec<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Fields required to create a new [`Session`].
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub platform: Platform,
    pub token_hash: String,
    pub refresh_token_hash: Option<String>,
    pub client_id: Option<String>,
    pub scope: Vec<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

// =============================================================================
// API KEY
// =============================================================================

/// Access tier an API key is scoped to (§3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Authenticated,
    Team,
    Admin,
    Enterprise,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::Public,
        AccessLevel::Authenticated,
        AccessLevel::Team,
        AccessLevel::Admin,
        AccessLevel::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Authenticated => "authenticated",
            Self::Team => "team",
            Self::Admin => "admin",
            Self::Enterprise => "enterprise",
        }
    }
}

/// A server-to-server bearer credential (§3, §4.7).
///
/// The plain value is returned exactly once, at creation or rotation - only
/// `key_hash` is ever persisted. `name` must be unique per user among active
/// keys (enforced by a partial unique index in the repository layer).
#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub name: String,
    pub key_hash: String,
    pub user_id: Uuid,
    pub access_level: AccessLevel,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map(|exp| now <= exp).unwrap_or(true)
    }
}

/// Fields required to mint a new [`ApiKey`].
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub key_hash: String,
    pub user_id: Uuid,
    pub access_level: AccessLevel,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// USER ACCOUNT
// =============================================================================

/// The canonical identity every credential ultimately resolves to (§3, §4.9).
///
/// This gateway is not the system of record for rich user profile data (§1
/// non-goals) - it upserts the minimal fields needed to answer "who is this"
/// and hand a stable `user_id` downstream.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: Uuid,
    /// Always stored lowercased.
    pub email: String,
    pub role: String,
    /// Upstream identity provider that vouched for this user, if any.
    pub provider: Option<String>,
    pub raw_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to upsert a [`UserAccount`] (keyed on `user_id`).
#[derive(Debug, Clone)]
pub struct UpsertUserAccount {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub provider: Option<String>,
    pub raw_metadata: serde_json::Value,
}
