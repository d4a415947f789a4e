//! Participant portal handlers.
//!
//! Participants sign in through the link mailed to them
//! (`/portal/login/{identifier}`) and may then view and edit their own
//! contact details while registration is open.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tourney_portal::{
    auth::{AuthError, Principal, SessionKind},
    participant::{Participant, ProfileUpdate},
    security::{PORTAL_LOGIN, RateLimitResult},
};

use super::{
    AppState,
    error::ApiError,
    middleware::{ClientIp, session_cookie},
};
use crate::{logging, metrics};

#[derive(Debug, Serialize)]
pub struct ParticipantSessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub participant_id: i64,
    pub tournament_id: i64,
}

/// What a participant may see of their doubles partner
///
/// Leaves out the partner's login identifier and contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nickname: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub did: Option<i64>,
}

impl From<Participant> for PartnerView {
    fn from(participant: Participant) -> Self {
        Self {
            id: participant.id,
            first_name: participant.first_name,
            last_name: participant.last_name,
            nickname: participant.nickname,
            city: participant.city,
            state: participant.state,
            did: participant.did,
        }
    }
}

/// Exchange a login link identifier for a participant session
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let check = state.rate_limiter.check(PORTAL_LOGIN, &ip).await?;
    if let RateLimitResult::Locked { .. } = check {
        metrics::rate_limit_hits_total(PORTAL_LOGIN);
        return Err(ApiError::rate_limited(check.retry_after(Utc::now())));
    }

    let login = match state.auth_manager.login_participant(&identifier).await {
        Ok(login) => login,
        Err(AuthError::InvalidLoginLink) => {
            metrics::login_attempts_total("participant", false);
            logging::log_security_event(
                "invalid_login_link",
                None,
                Some(&ip),
                "Unknown participant login identifier",
            );
            state.rate_limiter.record_failure(PORTAL_LOGIN, &ip).await?;
            return Err(AuthError::InvalidLoginLink.into());
        }
        Err(error) => return Err(error.into()),
    };

    state.rate_limiter.reset(PORTAL_LOGIN, &ip).await;
    metrics::login_attempts_total("participant", true);

    let session = login.session;
    let cookie = session_cookie(
        SessionKind::Participant,
        &session.token,
        session.expires_at,
        state.cookie_secure,
    )?;
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(ParticipantSessionResponse {
            token: session.token,
            expires_at: session.expires_at,
            participant_id: login.participant_id,
            tournament_id: login.tournament_id,
        }),
    ))
}

fn own_id(principal: &Principal) -> Result<i64, ApiError> {
    principal.participant_id().ok_or_else(ApiError::forbidden)
}

pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Participant>, ApiError> {
    let participant_id = own_id(&principal)?;
    Ok(Json(state.participant_manager.get(participant_id).await?))
}

/// Edit one's own contact fields
///
/// Admin-only fields are refused with `403`, as is any edit once the
/// tournament has left registration.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Participant>, ApiError> {
    let participant_id = own_id(&principal)?;
    let participant = state
        .participant_manager
        .update_profile(&principal, participant_id, update)
        .await?;
    Ok(Json(participant))
}

pub async fn partner(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Option<PartnerView>>, ApiError> {
    let participant_id = own_id(&principal)?;
    let partner = state
        .participant_manager
        .doubles_partner(participant_id)
        .await?;
    Ok(Json(partner.map(PartnerView::from)))
}
