//! Participant administration handlers.
//!
//! Every handler checks that the caller manages the participant's
//! tournament before touching the record.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tourney_portal::{
    auth::Principal,
    participant::{NewParticipant, Participant, ParticipantFilter, ProfileUpdate, Team},
};

use super::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PairRequest {
    pub partner_id: i64,
}

#[derive(Debug, Serialize)]
pub struct PairResponse {
    pub did: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewTeamRequest {
    pub name: String,
    #[serde(default)]
    pub legacy_tid: Option<i64>,
}

/// `null` removes the participant from their team
#[derive(Debug, Deserialize)]
pub struct TeamAssignment {
    pub team_id: Option<i64>,
}

async fn ensure_manage(
    state: &AppState,
    principal: &Principal,
    tournament_id: i64,
) -> Result<(), ApiError> {
    principal.require_admin()?;
    state
        .auth_manager
        .ensure_can_manage(principal, tournament_id)
        .await?;
    Ok(())
}

/// Load a participant the caller manages
async fn managed_participant(
    state: &AppState,
    principal: &Principal,
    participant_id: i64,
) -> Result<Participant, ApiError> {
    principal.require_admin()?;
    let participant = state.participant_manager.get(participant_id).await?;
    ensure_manage(state, principal, participant.tournament_id).await?;
    Ok(participant)
}

/// Search a tournament's participants
///
/// Query parameters mirror [`ParticipantFilter`]: `name`, `email`,
/// `team_id`, `has_partner`, `missing_average`, `sort`, `descending`,
/// `limit`, `offset`.
pub async fn search(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
    Query(mut filter): Query<ParticipantFilter>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    ensure_manage(&state, &principal, tournament_id).await?;
    filter.tournament_id = tournament_id;
    Ok(Json(state.participant_manager.search(&filter).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
    Json(request): Json<NewParticipant>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    ensure_manage(&state, &principal, tournament_id).await?;
    let participant = state
        .participant_manager
        .create(principal.admin_id(), tournament_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(participant_id): Path<i64>,
) -> Result<Json<Participant>, ApiError> {
    Ok(Json(
        managed_participant(&state, &principal, participant_id).await?,
    ))
}

/// Admin edit; any field may change, in any tournament state
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(participant_id): Path<i64>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Participant>, ApiError> {
    principal.require_admin()?;
    let participant = state
        .participant_manager
        .update_profile(&principal, participant_id, update)
        .await?;
    Ok(Json(participant))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(participant_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    managed_participant(&state, &principal, participant_id).await?;
    state
        .participant_manager
        .delete(principal.admin_id(), participant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issue a new login link, invalidating the old identifier
pub async fn regenerate_identifier(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(participant_id): Path<i64>,
) -> Result<Json<Participant>, ApiError> {
    managed_participant(&state, &principal, participant_id).await?;
    let participant = state
        .participant_manager
        .regenerate_identifier(principal.admin_id(), participant_id)
        .await?;
    Ok(Json(participant))
}

pub async fn pair(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(participant_id): Path<i64>,
    Json(request): Json<PairRequest>,
) -> Result<Json<PairResponse>, ApiError> {
    managed_participant(&state, &principal, participant_id).await?;
    let did = state
        .participant_manager
        .pair_doubles(principal.admin_id(), participant_id, request.partner_id)
        .await?;
    Ok(Json(PairResponse { did }))
}

pub async fn unpair(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(participant_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    managed_participant(&state, &principal, participant_id).await?;
    state
        .participant_manager
        .unpair(principal.admin_id(), participant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(participant_id): Path<i64>,
    Json(request): Json<TeamAssignment>,
) -> Result<Json<Participant>, ApiError> {
    managed_participant(&state, &principal, participant_id).await?;
    let participant = state
        .participant_manager
        .assign_team(principal.admin_id(), participant_id, request.team_id)
        .await?;
    Ok(Json(participant))
}

pub async fn list_teams(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
) -> Result<Json<Vec<Team>>, ApiError> {
    ensure_manage(&state, &principal, tournament_id).await?;
    Ok(Json(
        state.participant_manager.list_teams(tournament_id).await?,
    ))
}

pub async fn create_team(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
    Json(request): Json<NewTeamRequest>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    ensure_manage(&state, &principal, tournament_id).await?;
    let team = state
        .participant_manager
        .create_team(
            principal.admin_id(),
            tournament_id,
            &request.name,
            request.legacy_tid,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(team)))
}
