//! Admin authentication handlers.
//!
//! Login sets an `HttpOnly` session cookie and also returns the token in the
//! body for API clients.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "director@example.com", "password": "Strikes4AndSpares"}'
//! ```

use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tourney_portal::{
    auth::{Admin, AuthError, Principal, SessionKind},
    security::{ADMIN_LOGIN, RateLimitResult},
};

use super::{
    AppState,
    error::ApiError,
    middleware::{ClientIp, clear_cookie, session_cookie},
};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminSessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub admin: Admin,
}

/// Admin email/password login
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: Account disabled
/// - `429 Too Many Requests`: Too many failures from this address
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let check = state.rate_limiter.check(ADMIN_LOGIN, &ip).await?;
    if let RateLimitResult::Locked { .. } = check {
        metrics::rate_limit_hits_total(ADMIN_LOGIN);
        return Err(ApiError::rate_limited(check.retry_after(Utc::now())));
    }

    let (admin, session) = match state
        .auth_manager
        .login_admin(&payload.email, &payload.password)
        .await
    {
        Ok(result) => result,
        Err(error @ (AuthError::InvalidCredentials | AuthError::AccountDisabled)) => {
            metrics::login_attempts_total("admin", false);
            logging::log_security_event("failed_admin_login", None, Some(&ip), &error.to_string());
            let after = state.rate_limiter.record_failure(ADMIN_LOGIN, &ip).await?;
            if let RateLimitResult::Locked { .. } = after {
                logging::log_security_event(
                    "admin_login_locked",
                    None,
                    Some(&ip),
                    "Too many failed admin logins",
                );
            }
            return Err(error.into());
        }
        Err(error) => return Err(error.into()),
    };

    state.rate_limiter.reset(ADMIN_LOGIN, &ip).await;
    metrics::login_attempts_total("admin", true);

    let cookie = session_cookie(
        SessionKind::Admin,
        &session.token,
        session.expires_at,
        state.cookie_secure,
    )?;
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(AdminSessionResponse {
            token: session.token,
            expires_at: session.expires_at,
            admin,
        }),
    ))
}

/// Clear both session cookies
///
/// Sessions are stateless, so a copied bearer token stays valid until it
/// expires.
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (SET_COOKIE, clear_cookie(SessionKind::Admin, state.cookie_secure)?),
            (SET_COOKIE, clear_cookie(SessionKind::Participant, state.cookie_secure)?),
        ]),
    ))
}

/// The authenticated caller
///
/// Admins also get their account and assigned tournament IDs.
pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = match principal {
        Principal::Admin { id, .. } => {
            let admin = state.auth_manager.get_admin(id).await?;
            let tournaments = state.auth_manager.admin_tournaments(id).await?;
            json!({ "principal": principal, "admin": admin, "tournaments": tournaments })
        }
        Principal::Participant { .. } => json!({ "principal": principal }),
    };
    Ok(Json(body))
}
