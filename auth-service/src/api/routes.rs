//! # Route Configuration
//!
//! Defines URL patterns and maps them to handler functions (§6). Routes are
//! grouped by the credential modality they serve: the OAuth2/PKCE surface
//! speaks the exact RFC 6749/7009/7662 path and field vocabulary so generic
//! OAuth2 clients can interoperate with it unmodified, while the session,
//! API-key, and UAI-verify surfaces are this gateway's own `/v1/*` API.
//!
//! ## Route Structure
//!
//! ```text
//! /
//! ├── health                            GET   → health_check
//! │
//! ├── oauth/
//! │   ├── authorize                     GET   → oauth_authorize
//! │   ├── token                         POST  → oauth_token
//! │   ├── revoke                        POST  → oauth_revoke
//! │   └── introspect                    POST  → oauth_introspect
//! │
//! └── v1/
//!     ├── auth/
//!     │   ├── login                     POST  → login
//!     │   ├── logout                    POST  → logout
//!     │   ├── session                   GET   → get_session
//!     │   └── verify                    POST  → verify
//!     │
//!     └── api-keys/
//!         ├── (create)                  POST  → create_api_key
//!         ├── (list)                    GET   → list_api_keys
//!         ├── {id}/rotate                POST  → rotate_api_key
//!         └── {id}                      DELETE → revoke_api_key
//! ```
//!
//! ## Authentication
//!
//! `/oauth/authorize`, `/v1/auth/logout`, `/v1/auth/session`, and every
//! `/v1/api-keys/*` route require a signed-in caller - either the browser
//! session cookie or a bearer credential resolved through
//! [`crate::service::uai_service`]. `/oauth/token`, `/oauth/revoke`,
//! `/oauth/introspect`, and `/v1/auth/login` are public per their RFC/login
//! contracts; authentication there is the credential being exchanged, not a
//! precondition for calling the endpoint.
//!
//! ## Related Documentation
//!
//! - Handler implementations: [`super::handlers`]
//! - Request/response shapes: [`super::dto`]

use actix_web::web;

use super::handlers;

/// Configures all routes for the auth gateway.
///
/// Called from `main.rs` during app initialization:
///
/// ```rust,ignore
/// App::new()
///     .configure(routes::configure)
/// ```
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // ─────────────────────────────────────────────────────────────────
        // Health Check
        // ─────────────────────────────────────────────────────────────────
        .route("/health", web::get().to(handlers::health_check))
        // ─────────────────────────────────────────────────────────────────
        // OAuth2 / PKCE (§4.5, §6) - RFC wire vocabulary, unversioned paths
        // ─────────────────────────────────────────────────────────────────
        .service(
            web::scope("/oauth")
                .route("/authorize", web::get().to(handlers::oauth_authorize))
                .route("/token", web::post().to(handlers::oauth_token))
                .route("/revoke", web::post().to(handlers::oauth_revoke))
                .route("/introspect", web::post().to(handlers::oauth_introspect)),
        )
        // ─────────────────────────────────────────────────────────────────
        // Gateway-native API v1
        // ─────────────────────────────────────────────────────────────────
        .service(
            web::scope("/v1")
                .service(
                    web::scope("/auth")
                        //
                        // POST /v1/auth/login
                        // Mints a browser session for an already-verified credential.
                        // Request: LoginRequest { email, password }
                        // Response: SessionResponse + Set-Cookie
                        .route("/login", web::post().to(handlers::login))
                        //
                        // POST /v1/auth/logout
                        // Revokes the session behind the presented cookie.
                        .route("/logout", web::post().to(handlers::logout))
                        //
                        // GET /v1/auth/session
                        // Returns the current session's identity metadata.
                        .route("/session", web::get().to(handlers::get_session))
                        //
                        // POST /v1/auth/verify
                        // Validates an arbitrary bearer/API-key credential via UAI.
                        .route("/verify", web::post().to(handlers::verify)),
                )
                .service(
                    web::scope("/api-keys")
                        //
                        // POST /v1/api-keys - mint a new key; plain value shown once
                        .route("", web::post().to(handlers::create_api_key))
                        //
                        // GET /v1/api-keys - list metadata for the caller's keys
                        .route("", web::get().to(handlers::list_api_keys))
                        //
                        // POST /v1/api-keys/{id}/rotate - new value, same id
                        .route("/{id}/rotate", web::post().to(handlers::rotate_api_key))
                        //
                        // DELETE /v1/api-keys/{id} - revoke (soft-delete)
                        .route("/{id}", web::delete().to(handlers::revoke_api_key)),
                ),
        );
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn unknown_route_returns_404() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn oauth_token_rejects_get() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/oauth/token").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
