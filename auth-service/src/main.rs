//! # Auth Gateway
//!
//! The **auth-gateway** centralizes identity for a multi-tenant SaaS
//! platform across four credential modalities: OAuth2/PKCE authorization
//! codes, opaque API keys, browser session cookies, and the Universal Auth
//! Identifier (UAI) resolution layer that unifies all three into one
//! canonical identity for downstream services (§1).
//!
//! ## Architecture Overview
//!
//! This service follows the same layering the rest of the workspace uses,
//! generalized from a single-table user store to the four engines below:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Layer (api/)                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │
//! │  │   routes    │  │  handlers   │  │    DTOs (Request/Res)   │ │
//! │  └──────┬──────┘  └──────┬──────┘  └────────────┬────────────┘ │
//! └─────────┼────────────────┼─────────────────────┼───────────────┘
//!           │                │                      │
//!           ▼                ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Service Layer (service/)                      │
//! │  OAuthService │ SessionService │ ApiKeyService │ UaiService       │
//! │  RateLimitService │ OutboxWorker │ event_log                     │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Repository Layer (repository/)                  │
//! │  One module per aggregate table - see `repository` module docs.  │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           Domain Layer (domain/) + Tiered Cache (cache/)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## API Endpoints
//!
//! See [`api::routes::configure`] for the authoritative route table; §6 of
//! the design documents the wire contract for each.
//!
//! ## Security Features
//!
//! - **Opaque credentials**: no embedded claims; SHA-256 hash is the only
//!   persisted secret for authorization codes, tokens, sessions, and API
//!   keys (§4.1).
//! - **PKCE (S256)**: enforced on every authorization-code grant that
//!   requires it; `code_verifier` is checked in constant time.
//! - **Refresh-token rotation with replay defense**: reusing a rotated
//!   refresh token revokes its entire chain (§4.5).
//! - **Rate limiting**: sliding-window counters, fail-open on backing-store
//!   outage (§4.8).
//! - **Tiered cache with graceful degradation**: short-lived OAuth state
//!   survives an L1/L2 outage via the authoritative L3 table (§4.4).
//!
//! ## Configuration
//!
//! Environment variables are loaded via [`shared::config::AppConfig`]. See
//! that module's docs for the full `APP_`-prefixed variable list, including
//! the gateway-specific `APP_OAUTH__*`, `APP_SESSION__*`, `APP_UAI__*`,
//! `APP_OUTBOX__*`, and `APP_RATE_LIMIT__*` sections.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::{config::AppConfig, database, redis_client::RedisClient, tracing_config};
use std::time::Duration;
use tracing::{error, info, warn};

mod api;
mod cache;
mod domain;
mod repository;
mod service;

use api::routes;
use cache::{l1::L1Cache, tiered::TieredCache};
use service::{
    api_key_service::ApiKeyService, oauth_service::OAuthService,
    outbox_worker::OutboxWorker, rate_limit_service::RateLimitService,
    session_service::SessionService, uai_service::UaiService,
};
use shared::auth::jwt::JwtDecoder;

/// L1 cache capacity, shared by every cached kind (OAuth clients, auth
/// codes, UAI resolutions). Generous relative to any single tenant's live
/// credential count; eviction is LRU-ish via `moka`'s TinyLFU policy once
/// exceeded.
const L1_MAX_CAPACITY: u64 = 100_000;

/// Shared application state injected into all request handlers via
/// [`actix_web::web::Data`].
///
/// Every engine here owns its own `PgPool` clone (pools are cheap to clone
/// - an `Arc` around a connection set) rather than sharing one top-level
/// handle, so each engine's constructor signature stays self-contained and
/// testable without threading a god-object through every call site (§9
/// Design Note: avoid implicit singletons, thread state through
/// constructors explicitly).
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub redis: Option<RedisClient>,
    pub oauth_service: OAuthService,
    pub session_service: SessionService,
    pub api_key_service: ApiKeyService,
    pub uai_service: UaiService,
    pub rate_limit_service: RateLimitService,
    pub outbox_worker: OutboxWorker,
    pub cookie_domain: String,
    pub session_ttl_seconds: i64,
}

/// Application entry point and server initialization.
///
/// # Initialization Sequence
///
/// 1. Load configuration from environment variables.
/// 2. Initialize structured logging/tracing.
/// 3. Create the PostgreSQL connection pool (authoritative L3 store, §4.2).
/// 4. Connect to Redis (L2 durable cache tier) - a failure here is logged
///    and the gateway starts without L2 rather than refusing to boot,
///    since §4.4's degradation contract requires L1/L2 outages to be
///    survivable, not fatal.
/// 5. Instantiate the four engines plus the outbox worker.
/// 6. Spawn the outbox delivery worker as a detached background task.
/// 7. Configure and start the HTTP server.
///
/// # Graceful Shutdown
///
/// Actix-web handles SIGTERM/SIGINT and drains in-flight requests before
/// closing database and Redis connections; the outbox worker is a detached
/// `tokio::spawn` and is not joined on shutdown, matching the "never
/// retried past process exit, re-attempted on restart" semantics of the
/// backing table rather than in-memory state (§5).
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        "Starting auth-gateway"
    );

    let db_pool = database::create_pool(&config.database)
        .await
        .expect("Failed to create database pool");

    let redis_client = match RedisClient::new(&config.redis).await {
        Ok(client) => Some(client),
        Err(error) => {
            warn!(%error, "Redis (L2 cache tier) unavailable at startup, continuing without it");
            None
        }
    };

    let l1 = L1Cache::new(L1_MAX_CAPACITY, Duration::from_secs(config.uai.cache_ttl_seconds as u64));
    let tiered_cache = TieredCache::new(l1, redis_client.clone(), Duration::from_secs(config.uai.cache_ttl_seconds as u64));
    let jwt_decoder = JwtDecoder::new(config.jwt.clone());

    let oauth_service = OAuthService::new(db_pool.clone(), config.oauth.clone(), tiered_cache.clone());
    let session_service = SessionService::new(db_pool.clone(), config.session.clone());
    let api_key_service = ApiKeyService::new(db_pool.clone());
    let uai_service = UaiService::new(db_pool.clone(), tiered_cache, jwt_decoder, config.uai.clone());
    let rate_limit_service = RateLimitService::new(redis_client.clone(), config.rate_limit.clone());
    let outbox_worker = OutboxWorker::new(db_pool.clone(), config.outbox.clone());

    // Outbox delivery runs forever in the background, independent of any
    // single request's lifetime (§4.3, §5).
    tokio::spawn(outbox_worker.clone().run());

    let cookie_domain = config.session.cookie_domain.clone();
    let session_ttl_seconds = config.session.ttl_seconds;

    let app_state = web::Data::new(AppState {
        pool: db_pool.clone(),
        redis: redis_client,
        oauth_service,
        session_service,
        api_key_service,
        uai_service,
        rate_limit_service,
        outbox_worker,
        cookie_domain,
        session_ttl_seconds,
    });

    let db_pool_data = web::Data::new(db_pool);

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    info!("Server listening on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        // In production, replace `allow_any_origin()` with the dashboard's
        // and CLI's actual origins - left permissive here since the out-of-
        // scope marketing/dashboard UI (§1) is the only first-party caller
        // and origin allow-listing is a deployment-time decision.
        let cors = Cors::default().allow_any_origin().allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .app_data(db_pool_data.clone())
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?
    .run()
    .await
    .map_err(|error| {
        error!(%error, "HTTP server terminated");
        error
    })
}
