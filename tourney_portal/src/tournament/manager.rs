//! Tournament manager for creating tournaments and driving their lifecycle.

use super::models::{
    HandicapRule, NewTournament, Tournament, TournamentId, TournamentState, TournamentUpdate,
};
use crate::{
    audit::{AuditAction, AuditError, AuditLog, NewAuditEntry},
    db::unique_violation,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use std::sync::Arc;
use thiserror::Error;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Tournament not found: {0}")]
    IdentifierNotFound(String),

    #[error("Tournament identifier already in use: {0}")]
    IdentifierTaken(String),

    #[error("Invalid tournament: {0}")]
    Validation(String),

    #[error("Cannot move tournament from {from} to {to}")]
    InvalidTransition {
        from: TournamentState,
        to: TournamentState,
    },

    #[error("Only tournaments in setup can be deleted (currently {0})")]
    NotInSetup(TournamentState),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

pub type TournamentResult<T> = Result<T, TournamentError>;

const TOURNAMENT_COLUMNS: &str = "id, identifier, name, year, location, start_date, end_date, \
     entry_deadline, handicap_base, handicap_percent, handicap_max, state, created_at";

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    pool: Arc<PgPool>,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a new tournament in the `Setup` state
    pub async fn create(
        &self,
        admin_id: Option<i64>,
        request: NewTournament,
    ) -> TournamentResult<Tournament> {
        request.validate().map_err(TournamentError::Validation)?;
        let handicap = request.handicap.unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        let taken = sqlx::query("SELECT 1 FROM tournaments WHERE identifier = $1")
            .bind(&request.identifier)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if taken {
            return Err(TournamentError::IdentifierTaken(request.identifier));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tournaments (identifier, name, year, location, start_date, end_date,
                                     entry_deadline, handicap_base, handicap_percent, handicap_max, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {TOURNAMENT_COLUMNS}
            "#
        ))
        .bind(&request.identifier)
        .bind(request.name.trim())
        .bind(request.year)
        .bind(non_empty(request.location.as_deref()))
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.entry_deadline.map(|dt| dt.naive_utc()))
        .bind(handicap.base)
        .bind(handicap.percent)
        .bind(handicap.max)
        .bind(TournamentState::Setup.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match unique_violation(&err) {
            Some("tournaments_identifier_key") => {
                TournamentError::IdentifierTaken(request.identifier.clone())
            }
            _ => TournamentError::Database(err),
        })?;
        let tournament = tournament_from_row(&row)?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::TournamentCreated)
                .with_tournament(tournament.id)
                .with_admin(admin_id)
                .with_details(serde_json::json!({ "identifier": tournament.identifier })),
        )
        .await?;

        tx.commit().await?;
        log::info!(
            "Created tournament {} ({})",
            tournament.identifier,
            tournament.id
        );
        Ok(tournament)
    }

    pub async fn get(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
        ))
        .bind(tournament_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(TournamentError::NotFound(tournament_id))?;
        tournament_from_row(&row)
    }

    pub async fn get_by_identifier(&self, identifier: &str) -> TournamentResult<Tournament> {
        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE identifier = $1"
        ))
        .bind(identifier)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| TournamentError::IdentifierNotFound(identifier.to_string()))?;
        tournament_from_row(&row)
    }

    /// List tournaments, newest year first
    ///
    /// With `include_setup == false` tournaments still being configured are
    /// hidden (the public listing).
    pub async fn list(&self, include_setup: bool) -> TournamentResult<Vec<Tournament>> {
        let query = if include_setup {
            format!(
                "SELECT {TOURNAMENT_COLUMNS} FROM tournaments ORDER BY year DESC, start_date DESC NULLS LAST, id DESC"
            )
        } else {
            format!(
                "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE state <> 'setup' ORDER BY year DESC, start_date DESC NULLS LAST, id DESC"
            )
        };

        let rows = sqlx::query(&query).fetch_all(self.pool.as_ref()).await?;
        rows.iter().map(tournament_from_row).collect()
    }

    /// Apply a partial update
    pub async fn update(
        &self,
        admin_id: Option<i64>,
        tournament_id: TournamentId,
        update: TournamentUpdate,
    ) -> TournamentResult<Tournament> {
        let current = self.get(tournament_id).await?;
        if update.is_empty() {
            return Ok(current);
        }
        update
            .validate(&current)
            .map_err(TournamentError::Validation)?;

        let mut tx = self.pool.begin().await?;

        let row = build_update_query(tournament_id, &update)
            .build()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))?;
        let tournament = tournament_from_row(&row)?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::TournamentUpdated)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_details(serde_json::to_value(&update).unwrap_or_default()),
        )
        .await?;

        tx.commit().await?;
        Ok(tournament)
    }

    /// Move a tournament to `next`
    ///
    /// The row is locked while checking the current state so concurrent
    /// transitions serialize.
    pub async fn transition(
        &self,
        admin_id: Option<i64>,
        tournament_id: TournamentId,
        next: TournamentState,
    ) -> TournamentResult<Tournament> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT state FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))?;
        let current = parse_state(&row)?;

        if !current.can_transition_to(next) {
            return Err(TournamentError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let row = sqlx::query(&format!(
            "UPDATE tournaments SET state = $1 WHERE id = $2 RETURNING {TOURNAMENT_COLUMNS}"
        ))
        .bind(next.as_str())
        .bind(tournament_id)
        .fetch_one(&mut *tx)
        .await?;
        let tournament = tournament_from_row(&row)?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::TournamentTransitioned)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_details(serde_json::json!({ "from": current, "to": next })),
        )
        .await?;

        tx.commit().await?;
        log::info!("Tournament {} moved {} -> {}", tournament_id, current, next);
        Ok(tournament)
    }

    /// Delete a tournament that never left `Setup`
    pub async fn delete(
        &self,
        admin_id: Option<i64>,
        tournament_id: TournamentId,
    ) -> TournamentResult<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT identifier, state FROM tournaments WHERE id = $1 FOR UPDATE")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))?;
        let state = parse_state(&row)?;
        if state != TournamentState::Setup {
            return Err(TournamentError::NotInSetup(state));
        }
        let identifier: String = row.get("identifier");

        sqlx::query("DELETE FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::TournamentDeleted)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_details(serde_json::json!({ "identifier": identifier })),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Build `UPDATE tournaments SET ... WHERE id = $n RETURNING ...`
///
/// Callers guarantee `update` is not empty.
pub(crate) fn build_update_query(
    tournament_id: TournamentId,
    update: &TournamentUpdate,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE tournaments SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(name) = &update.name {
            set.push("name = ").push_bind_unseparated(name.trim().to_string());
        }
        if let Some(location) = &update.location {
            set.push("location = ")
                .push_bind_unseparated(non_empty(Some(location)).map(str::to_string));
        }
        if let Some(start_date) = update.start_date {
            set.push("start_date = ").push_bind_unseparated(start_date);
        }
        if let Some(end_date) = update.end_date {
            set.push("end_date = ").push_bind_unseparated(end_date);
        }
        if let Some(deadline) = update.entry_deadline {
            set.push("entry_deadline = ")
                .push_bind_unseparated(deadline.naive_utc());
        }
        if let Some(handicap) = update.handicap {
            set.push("handicap_base = ").push_bind_unseparated(handicap.base);
            set.push("handicap_percent = ")
                .push_bind_unseparated(handicap.percent);
            set.push("handicap_max = ").push_bind_unseparated(handicap.max);
        }
    }
    qb.push(" WHERE id = ").push_bind(tournament_id);
    qb.push(" RETURNING ").push(TOURNAMENT_COLUMNS);
    qb
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_state(row: &PgRow) -> TournamentResult<TournamentState> {
    let state: String = row.get("state");
    state.parse().map_err(|state| {
        TournamentError::Database(sqlx::Error::Decode(
            format!("unknown tournament state {state:?}").into(),
        ))
    })
}

pub(crate) fn tournament_from_row(row: &PgRow) -> TournamentResult<Tournament> {
    Ok(Tournament {
        id: row.get("id"),
        identifier: row.get("identifier"),
        name: row.get("name"),
        year: row.get("year"),
        location: row.get("location"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        entry_deadline: row
            .get::<Option<chrono::NaiveDateTime>, _>("entry_deadline")
            .map(|dt| dt.and_utc()),
        handicap: HandicapRule {
            base: row.get("handicap_base"),
            percent: row.get("handicap_percent"),
            max: row.get("handicap_max"),
        },
        state: parse_state(row)?,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_query_binds_only_present_fields() {
        let update = TournamentUpdate {
            name: Some("Spring Classic".to_string()),
            location: Some(String::new()),
            ..Default::default()
        };
        let query = build_update_query(4, &update);
        let sql = query.sql();
        assert!(sql.starts_with("UPDATE tournaments SET name = $1, location = $2 WHERE id = $3"));
        assert!(sql.contains("RETURNING id, identifier"));
    }

    #[test]
    fn test_update_query_expands_handicap() {
        let update = TournamentUpdate {
            handicap: Some(HandicapRule::default()),
            ..Default::default()
        };
        let query = build_update_query(1, &update);
        let sql = query.sql();
        assert!(sql.contains(
            "handicap_base = $1, handicap_percent = $2, handicap_max = $3 WHERE id = $4"
        ));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" Reno ")), Some("Reno"));
        assert_eq!(non_empty(None), None);
    }
}
