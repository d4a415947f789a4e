//! Staff account management (super admins only).

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tourney_portal::auth::{Admin, AdminUpdate, NewAdmin, Principal};

use super::{AppState, error::ApiError};

pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Admin>>, ApiError> {
    principal.require_super_admin()?;
    Ok(Json(state.auth_manager.list_admins().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<NewAdmin>,
) -> Result<(StatusCode, Json<Admin>), ApiError> {
    principal.require_super_admin()?;
    let admin = state
        .auth_manager
        .create_admin(Some(&principal), request)
        .await?;
    Ok((StatusCode::CREATED, Json(admin)))
}

/// Change an admin's password and/or active flag
pub async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(admin_id): Path<i64>,
    Json(update): Json<AdminUpdate>,
) -> Result<Json<Admin>, ApiError> {
    let admin = state
        .auth_manager
        .update_admin(&principal, admin_id, &update)
        .await?;
    Ok(Json(admin))
}

pub async fn assign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((admin_id, tournament_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .auth_manager
        .assign_tournament(&principal, admin_id, tournament_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((admin_id, tournament_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .auth_manager
        .unassign_tournament(&principal, admin_id, tournament_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
