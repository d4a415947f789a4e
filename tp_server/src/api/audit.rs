//! Audit log browsing.

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use tourney_portal::{
    audit::{AuditEntry, AuditFilter},
    auth::Principal,
};

use super::{AppState, error::ApiError};

/// List audit entries, newest first
///
/// Super admins may browse everything. Tournament admins must name a
/// `tournament_id` they manage.
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    principal.require_admin()?;
    if !principal.is_super_admin() {
        let tournament_id = filter.tournament_id.ok_or_else(|| {
            ApiError::bad_request("tournament_id is required for tournament admins")
        })?;
        state
            .auth_manager
            .ensure_can_manage(&principal, tournament_id)
            .await?;
    }
    Ok(Json(state.audit_log.list(&filter).await?))
}
