//! Session authentication, client address extraction and request metrics.
//!
//! Protected routes sit behind [`auth_middleware`], which accepts either an
//! `Authorization: Bearer <token>` header or one of the session cookies and
//! injects the caller's [`Principal`] into the request extensions:
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use tourney_portal::auth::Principal;
//!
//! async fn protected_handler(Extension(principal): Extension<Principal>) -> String {
//!     format!("Authenticated as {:?}", principal)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{ConnectInfo, FromRequestParts, MatchedPath, Request, State},
    http::{HeaderMap, HeaderValue, header::AUTHORIZATION, header::COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    time::Instant,
};
use tourney_portal::auth::SessionKind;

use super::{AppState, error::ApiError};
use crate::{logging, metrics};

/// Cookie carrying an admin session
pub const ADMIN_COOKIE: &str = "tp_admin_session";

/// Cookie carrying a participant session
pub const PARTICIPANT_COOKIE: &str = "tp_participant_session";

/// Session token from the bearer header, else the admin cookie, else the
/// participant cookie
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    cookie_value(headers, ADMIN_COOKIE).or_else(|| cookie_value(headers, PARTICIPANT_COOKIE))
}

fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Authentication middleware that verifies the session and injects the
/// [`Principal`](tourney_portal::auth::Principal).
///
/// # Behavior
///
/// - **Success**: Session valid → Injects `Principal` into request extensions → Calls next handler
/// - **No token**: Returns `401 Unauthorized`
/// - **Invalid/expired token or disabled admin**: Returns `401`/`403`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers()).ok_or_else(ApiError::unauthenticated)?;
    let principal = state.auth_manager.verify_session(token).await?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Name of the cookie for a session kind
fn cookie_name(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Admin => ADMIN_COOKIE,
        SessionKind::Participant => PARTICIPANT_COOKIE,
    }
}

/// `Set-Cookie` value carrying a session until `expires_at`
pub fn session_cookie(
    kind: SessionKind,
    token: &str,
    expires_at: DateTime<Utc>,
    secure: bool,
) -> Result<HeaderValue, ApiError> {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    cookie_header(cookie_name(kind), token, max_age, secure)
}

/// `Set-Cookie` value that removes a session cookie
pub fn clear_cookie(kind: SessionKind, secure: bool) -> Result<HeaderValue, ApiError> {
    cookie_header(cookie_name(kind), "", 0, secure)
}

fn cookie_header(name: &str, value: &str, max_age: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::bad_request("Session token is not a valid cookie value"))
}

/// Client address used as the rate limiting key
///
/// The socket peer, unless the peer is a trusted proxy: then the nearest
/// `X-Forwarded-For` hop that is not itself a trusted proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(client_ip(
            &parts.headers,
            peer,
            &state.trusted_proxies,
        )))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };
    if !trusted.contains(&peer) {
        return peer.to_string();
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();
    hops.iter()
        .rev()
        .find(|hop| !hop.parse::<IpAddr>().is_ok_and(|ip| trusted.contains(&ip)))
        .or(hops.first())
        .map_or_else(|| peer.to_string(), |hop| hop.to_string())
}

/// Count and log every routed request under its route template
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    metrics::http_requests_total(&method, &path, status);
    metrics::http_request_duration_ms(&method, &path, elapsed.as_secs_f64() * 1000.0);
    logging::log_api_request(&method, &path, status, elapsed.as_millis() as u64);

    response
}
