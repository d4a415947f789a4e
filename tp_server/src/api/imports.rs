//! File import handlers.
//!
//! The request body is the raw file:
//!
//! ```bash
//! curl -X POST "http://localhost:8080/api/v1/admin/tournaments/3/imports/scores?format=xml" \
//!   -H "Authorization: Bearer $TOKEN" \
//!   --data-binary @lanes.xml
//! ```

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tourney_portal::{
    auth::Principal,
    import::{ImportKind, ImportReport, ImportResult, ScoreFormat},
};

use super::{AppState, error::ApiError};
use crate::metrics;

#[derive(Debug, Default, Deserialize)]
pub struct ScoreImportQuery {
    /// `csv` (default) or `xml`
    pub format: Option<String>,
}

async fn authorize(
    state: &AppState,
    principal: &Principal,
    tournament_id: i64,
) -> Result<i64, ApiError> {
    let (admin_id, _) = principal.require_admin()?;
    state
        .auth_manager
        .ensure_can_manage(principal, tournament_id)
        .await?;
    Ok(admin_id)
}

fn record(kind: ImportKind, result: ImportResult<ImportReport>) -> Result<Json<ImportReport>, ApiError> {
    match result {
        Ok(report) => {
            metrics::imports_total(kind.as_str(), true);
            metrics::import_rows_skipped(kind.as_str(), report.skipped.len());
            Ok(Json(report))
        }
        Err(error) => {
            metrics::imports_total(kind.as_str(), false);
            tracing::warn!(kind = kind.as_str(), error = %error, "Import rejected");
            Err(error.into())
        }
    }
}

/// Upload a registration CSV
pub async fn registrations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
    body: Bytes,
) -> Result<Json<ImportReport>, ApiError> {
    let admin_id = authorize(&state, &principal, tournament_id).await?;
    let result = state
        .import_manager
        .import_registrations(Some(admin_id), tournament_id, &body)
        .await;
    record(ImportKind::Registrations, result)
}

/// Upload a score file in CSV or lane-scoring XML form
pub async fn scores(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(tournament_id): Path<i64>,
    Query(query): Query<ScoreImportQuery>,
    body: Bytes,
) -> Result<Json<ImportReport>, ApiError> {
    let admin_id = authorize(&state, &principal, tournament_id).await?;
    let format = match query.format.as_deref() {
        Some(format) => format.parse::<ScoreFormat>()?,
        None => ScoreFormat::default(),
    };
    let result = state
        .import_manager
        .import_scores(Some(admin_id), tournament_id, format, &body)
        .await;
    record(ImportKind::Scores, result)
}
