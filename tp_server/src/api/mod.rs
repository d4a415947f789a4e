//! HTTP JSON API for the tournament portal.
//!
//! # Modules
//!
//! - [`auth`]: Admin login/logout and the current principal
//! - [`portal`]: Participant login links and self-service profile editing
//! - [`tournaments`]: Public listing, standings, and tournament administration
//! - [`participants`]: Participant records, doubles pairing and teams
//! - [`imports`]: CSV/XML uploads
//! - [`audit`]: Audit log browsing
//! - [`admins`]: Staff accounts and tournament assignments
//! - [`middleware`]: Session authentication and request metrics
//! - [`error`]: Error to response mapping
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health
//! POST   /api/v1/auth/login
//! POST   /api/v1/auth/logout
//! GET    /api/v1/auth/me                                   (session)
//! GET    /api/v1/portal/login/{identifier}
//! GET    /api/v1/portal/me                                 (participant)
//! PATCH  /api/v1/portal/me                                 (participant)
//! GET    /api/v1/portal/me/partner                         (participant)
//! GET    /api/v1/tournaments
//! GET    /api/v1/tournaments/{id}/standings/{event}
//! GET    /api/v1/admin/tournaments                         (admin)
//! POST   /api/v1/admin/tournaments                         (super admin)
//! PATCH  /api/v1/admin/tournaments/{id}                    (managing admin)
//! DELETE /api/v1/admin/tournaments/{id}                    (super admin)
//! POST   /api/v1/admin/tournaments/{id}/state              (managing admin)
//! GET    /api/v1/admin/tournaments/{id}/participants       (managing admin)
//! POST   /api/v1/admin/tournaments/{id}/participants       (managing admin)
//! GET    /api/v1/admin/tournaments/{id}/teams              (managing admin)
//! POST   /api/v1/admin/tournaments/{id}/teams              (managing admin)
//! POST   /api/v1/admin/tournaments/{id}/imports/registrations
//! POST   /api/v1/admin/tournaments/{id}/imports/scores?format=csv|xml
//! GET    /api/v1/admin/participants/{id}
//! PATCH  /api/v1/admin/participants/{id}
//! DELETE /api/v1/admin/participants/{id}
//! POST   /api/v1/admin/participants/{id}/identifier
//! POST   /api/v1/admin/participants/{id}/partner
//! DELETE /api/v1/admin/participants/{id}/partner
//! PUT    /api/v1/admin/participants/{id}/team
//! GET    /api/v1/admin/audit
//! GET    /api/v1/admin/admins                              (super admin)
//! POST   /api/v1/admin/admins                              (super admin)
//! PATCH  /api/v1/admin/admins/{id}                         (super admin)
//! POST   /api/v1/admin/admins/{id}/tournaments/{tid}       (super admin)
//! DELETE /api/v1/admin/admins/{id}/tournaments/{tid}       (super admin)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tp_server::api::{AppState, create_router};
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::new(
//!     pool,
//!     "pepper-from-env".to_string(),
//!     "session-secret-from-env".to_string(),
//!     false,
//! );
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is permissive; the portal front end is served from another origin.

pub mod admins;
pub mod audit;
pub mod auth;
pub mod error;
pub mod imports;
pub mod middleware;
pub mod participants;
pub mod portal;
pub mod request_id;
pub mod tournaments;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post, put},
};
use serde_json::json;
use sqlx::PgPool;
use std::{net::IpAddr, sync::Arc};
use tourney_portal::{
    audit::AuditLog, auth::AuthManager, import::ImportManager, participant::ParticipantManager,
    security::RateLimiter, standings::StandingsManager, tournament::TournamentManager,
};
use tower_http::cors::CorsLayer;

/// Largest accepted import upload
pub const IMPORT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every manager sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub tournament_manager: Arc<TournamentManager>,
    pub participant_manager: Arc<ParticipantManager>,
    pub import_manager: Arc<ImportManager>,
    pub standings_manager: Arc<StandingsManager>,
    pub audit_log: Arc<AuditLog>,
    pub rate_limiter: RateLimiter,
    pub pool: Arc<PgPool>,
    /// Mark session cookies `Secure`
    pub cookie_secure: bool,
    /// Peers allowed to set `X-Forwarded-For`
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    /// Build every manager over one pool
    pub fn new(pool: PgPool, pepper: String, session_secret: String, cookie_secure: bool) -> Self {
        let pool = Arc::new(pool);
        Self {
            auth_manager: Arc::new(AuthManager::new(pool.clone(), pepper, session_secret)),
            tournament_manager: Arc::new(TournamentManager::new(pool.clone())),
            participant_manager: Arc::new(ParticipantManager::new(pool.clone())),
            import_manager: Arc::new(ImportManager::new(pool.clone())),
            standings_manager: Arc::new(StandingsManager::new(pool.clone())),
            audit_log: Arc::new(AuditLog::new(pool.clone())),
            rate_limiter: RateLimiter::new(),
            pool,
            cookie_secure,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    /// Believe `X-Forwarded-For` from these peers
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = proxies.into();
        self
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router(state.clone()))
        .route_layer(axum::middleware::from_fn(middleware::track_requests))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/portal/login/{identifier}", get(portal::login))
        .route("/tournaments", get(tournaments::list_public))
        .route(
            "/tournaments/{id}/standings/{event}",
            get(tournaments::standings),
        );

    let import_routes = Router::new()
        .route(
            "/tournaments/{id}/imports/registrations",
            post(imports::registrations),
        )
        .route("/tournaments/{id}/imports/scores", post(imports::scores))
        .layer(DefaultBodyLimit::max(IMPORT_BODY_LIMIT));

    let admin_routes = Router::new()
        .route(
            "/tournaments",
            get(tournaments::list_admin).post(tournaments::create),
        )
        .route(
            "/tournaments/{id}",
            patch(tournaments::update).delete(tournaments::delete),
        )
        .route("/tournaments/{id}/state", post(tournaments::transition))
        .route(
            "/tournaments/{id}/participants",
            get(participants::search).post(participants::create),
        )
        .route(
            "/tournaments/{id}/teams",
            get(participants::list_teams).post(participants::create_team),
        )
        .merge(import_routes)
        .route(
            "/participants/{id}",
            get(participants::get)
                .patch(participants::update)
                .delete(participants::delete),
        )
        .route(
            "/participants/{id}/identifier",
            post(participants::regenerate_identifier),
        )
        .route(
            "/participants/{id}/partner",
            post(participants::pair).delete(participants::unpair),
        )
        .route("/participants/{id}/team", put(participants::assign_team))
        .route("/audit", get(audit::list))
        .route("/admins", get(admins::list).post(admins::create))
        .route("/admins/{id}", patch(admins::update))
        .route(
            "/admins/{id}/tournaments/{tid}",
            post(admins::assign).delete(admins::unassign),
        );

    let session_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/portal/me", get(portal::me).patch(portal::update_me))
        .route("/portal/me/partner", get(portal::partner))
        .nest("/admin", admin_routes)
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new().merge(public_routes).merge(session_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the database answers, `503 Service Unavailable`
/// otherwise.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = sqlx::query("SELECT 1")
        .fetch_one(state.pool.as_ref())
        .await
        .is_ok();

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
