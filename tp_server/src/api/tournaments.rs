//! Tournament listing, standings and administration handlers.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tourney_portal::{
    auth::Principal,
    standings::{Event, StandingRow, StandingsError},
    tournament::{NewTournament, StateTransition, Tournament, TournamentState, TournamentUpdate},
};

use super::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct StandingsResponse {
    pub tournament_id: i64,
    pub event: Event,
    pub rows: Vec<StandingRow>,
}

/// Public list; tournaments still in setup are hidden
pub async fn list_public(State(state): State<AppState>) -> Result<Json<Vec<Tournament>>, ApiError> {
    Ok(Json(state.tournament_manager.list(false).await?))
}

/// Public standings for one event
///
/// `event` is `singles`, `doubles`, `team` or `all_events`.
pub async fn standings(
    State(state): State<AppState>,
    Path((tournament_id, event)): Path<(i64, String)>,
) -> Result<Json<StandingsResponse>, ApiError> {
    let event: Event = event.parse().map_err(StandingsError::UnknownEvent)?;

    let tournament = state.tournament_manager.get(tournament_id).await?;
    if tournament.state == TournamentState::Setup {
        return Err(ApiError::not_found(format!(
            "Tournament not found: {tournament_id}"
        )));
    }

    let rows = state
        .standings_manager
        .compute(tournament_id, event)
        .await?;
    Ok(Json(StandingsResponse {
        tournament_id,
        event,
        rows,
    }))
}

/// Every tournament the caller administers, setup included
pub async fn list_admin(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Tournament>>, ApiError> {
    let (admin_id, _) = principal.require_admin()?;
    let mut tournaments = state.tournament_manager.list(true).await?;
    if !principal.is_super_admin() {
        let assigned = state.auth_manager.admin_tournaments(admin_id).await?;
        tournaments.retain(|t| assigned.contains(&t.id));
    }
    Ok(Json(tournaments))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewTournament>,
) -> Result<(StatusCode, Json<Tournament>), ApiError> {
    let admin_id = principal.require_super_admin()?;
    let tournament = state
        .tournament_manager
        .create(Some(admin_id), request)
        .await?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
    Json(update): Json<TournamentUpdate>,
) -> Result<Json<Tournament>, ApiError> {
    state
        .auth_manager
        .ensure_can_manage(&principal, tournament_id)
        .await?;
    let tournament = state
        .tournament_manager
        .update(principal.admin_id(), tournament_id, update)
        .await?;
    Ok(Json(tournament))
}

/// Move the tournament along its lifecycle
pub async fn transition(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
    Json(request): Json<StateTransition>,
) -> Result<Json<Tournament>, ApiError> {
    state
        .auth_manager
        .ensure_can_manage(&principal, tournament_id)
        .await?;
    let tournament = state
        .tournament_manager
        .transition(principal.admin_id(), tournament_id, request.state)
        .await?;
    Ok(Json(tournament))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let admin_id = principal.require_super_admin()?;
    state
        .tournament_manager
        .delete(Some(admin_id), tournament_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
