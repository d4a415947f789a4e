//! Participant manager: registration records, profile edits, doubles and teams.

use super::{
    errors::{ParticipantError, ParticipantResult},
    models::{
        NewParticipant, Participant, ParticipantFilter, ParticipantId, ProfileUpdate, Team,
        generate_identifier,
    },
};
use crate::{
    audit::{AuditAction, AuditLog, NewAuditEntry},
    auth::{AdminRole, Principal},
    db::unique_violation,
    tournament::TournamentState,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use std::sync::Arc;

pub(crate) const PARTICIPANT_COLUMNS: &str = "id, tournament_id, pid, did, team_id, identifier, \
     first_name, last_name, nickname, email, phone, birth_date, city, state, country, usbc_id, \
     average, created_at, updated_at";

/// Participant manager
#[derive(Clone)]
pub struct ParticipantManager {
    pool: Arc<PgPool>,
}

impl ParticipantManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Register a participant
    ///
    /// # Errors
    ///
    /// * `ParticipantError::TournamentNotFound` - No such tournament
    /// * `ParticipantError::PidTaken` - `pid` already used in the tournament
    /// * `ParticipantError::TeamNotFound` - `team_id` belongs elsewhere
    /// * `ParticipantError::DoublesPairFull` - Two others already share `did`
    pub async fn create(
        &self,
        admin_id: Option<i64>,
        tournament_id: i64,
        request: NewParticipant,
    ) -> ParticipantResult<Participant> {
        request.validate().map_err(ParticipantError::Validation)?;

        let mut tx = self.pool.begin().await?;

        lock_tournament(&mut tx, tournament_id, request.did.is_some()).await?;
        if let Some(pid) = request.pid {
            ensure_pid_free(&mut tx, tournament_id, pid, None).await?;
        }
        if let Some(did) = request.did {
            ensure_did_has_room(&mut tx, tournament_id, did, None).await?;
        }
        if let Some(team_id) = request.team_id {
            ensure_team_in_tournament(&mut tx, tournament_id, team_id).await?;
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO participants (tournament_id, pid, did, team_id, identifier, first_name,
                                      last_name, nickname, email, phone, birth_date, city, state,
                                      country, usbc_id, average)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        ))
        .bind(tournament_id)
        .bind(request.pid)
        .bind(request.did)
        .bind(request.team_id)
        .bind(generate_identifier())
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(clean_text(request.nickname.as_deref()))
        .bind(clean_email(request.email.as_deref()))
        .bind(clean_text(request.phone.as_deref()))
        .bind(request.birth_date)
        .bind(clean_text(request.city.as_deref()))
        .bind(clean_text(request.state.as_deref()))
        .bind(clean_text(request.country.as_deref()))
        .bind(clean_text(request.usbc_id.as_deref()))
        .bind(request.average)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| pid_conflict(err, request.pid))?;
        let participant = participant_from_row(&row);

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::ParticipantCreated)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_participant(participant.id)
                .with_details(serde_json::json!({ "name": participant.display_name() })),
        )
        .await?;

        tx.commit().await?;
        Ok(participant)
    }

    pub async fn get(&self, participant_id: ParticipantId) -> ParticipantResult<Participant> {
        let row = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = $1"
        ))
        .bind(participant_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(ParticipantError::NotFound(participant_id))?;
        Ok(participant_from_row(&row))
    }

    /// Look up by portal login identifier
    pub async fn get_by_identifier(&self, identifier: &str) -> ParticipantResult<Participant> {
        let row = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE identifier = $1"
        ))
        .bind(identifier)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(ParticipantError::IdentifierNotFound)?;
        Ok(participant_from_row(&row))
    }

    /// Edit a profile on behalf of `by`
    ///
    /// Participants may change only their own contact fields, and only while
    /// the tournament is open. Admins may change everything in tournaments
    /// they manage, in any state.
    pub async fn update_profile(
        &self,
        by: &Principal,
        participant_id: ParticipantId,
        update: ProfileUpdate,
    ) -> ParticipantResult<Participant> {
        update.validate().map_err(ParticipantError::Validation)?;
        let new_pid = update.pid.flatten();
        let new_did = update.did.flatten();

        let mut tx = self.pool.begin().await?;

        let tournament_id = tournament_of(&mut tx, participant_id).await?;
        let state = lock_tournament(&mut tx, tournament_id, new_did.is_some()).await?;
        lock_participant(&mut tx, participant_id).await?;

        let assigned = assigned_tournaments(&mut tx, by).await?;
        if !by.can_edit_participant(participant_id, tournament_id, &assigned) {
            return Err(ParticipantError::Forbidden);
        }

        if let Principal::Participant { .. } = by {
            let admin_only = update.admin_only_fields();
            if !admin_only.is_empty() {
                return Err(ParticipantError::AdminOnlyFields(admin_only));
            }
            let open = state
                .parse::<TournamentState>()
                .is_ok_and(TournamentState::accepts_profile_edits);
            if !open {
                return Err(ParticipantError::RegistrationClosed);
            }
        }

        if update.is_empty() {
            let row = sqlx::query(&format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = $1"
            ))
            .bind(participant_id)
            .fetch_one(&mut *tx)
            .await?;
            return Ok(participant_from_row(&row));
        }

        if let Some(pid) = new_pid {
            ensure_pid_free(&mut tx, tournament_id, pid, Some(participant_id)).await?;
        }
        if let Some(did) = new_did {
            ensure_did_has_room(&mut tx, tournament_id, did, Some(participant_id)).await?;
        }
        if let Some(Some(team_id)) = update.team_id {
            ensure_team_in_tournament(&mut tx, tournament_id, team_id).await?;
        }

        let row = build_update_query(participant_id, &update)
            .build()
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| pid_conflict(err, new_pid))?;
        let participant = participant_from_row(&row);

        let entry = NewAuditEntry::new(AuditAction::ParticipantUpdated)
            .with_tournament(tournament_id)
            .with_participant(participant_id)
            .with_admin(by.admin_id())
            .with_details(serde_json::json!({
                "fields": update.changed_fields(),
                "self_service": by.participant_id().is_some(),
            }));
        AuditLog::record(&mut *tx, &entry).await?;

        tx.commit().await?;
        Ok(participant)
    }

    pub async fn delete(
        &self,
        admin_id: Option<i64>,
        participant_id: ParticipantId,
    ) -> ParticipantResult<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "DELETE FROM participants WHERE id = $1 RETURNING tournament_id, first_name, last_name",
        )
        .bind(participant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ParticipantError::NotFound(participant_id))?;
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::ParticipantDeleted)
                .with_tournament(row.get("tournament_id"))
                .with_admin(admin_id)
                .with_participant(participant_id)
                .with_details(serde_json::json!({ "name": format!("{first_name} {last_name}") })),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Replace the portal login identifier, invalidating the old login link
    ///
    /// Sessions already issued from the old link stay valid until they expire.
    pub async fn regenerate_identifier(
        &self,
        admin_id: Option<i64>,
        participant_id: ParticipantId,
    ) -> ParticipantResult<Participant> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "UPDATE participants SET identifier = $1, updated_at = NOW() WHERE id = $2 RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(generate_identifier())
        .bind(participant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ParticipantError::NotFound(participant_id))?;
        let participant = participant_from_row(&row);

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::IdentifierRegenerated)
                .with_tournament(participant.tournament_id)
                .with_admin(admin_id)
                .with_participant(participant_id),
        )
        .await?;

        tx.commit().await?;
        Ok(participant)
    }

    /// Pair two participants for doubles under a fresh DID
    ///
    /// Returns the assigned DID, one greater than the highest DID in use in
    /// the tournament.
    pub async fn pair_doubles(
        &self,
        admin_id: Option<i64>,
        first: ParticipantId,
        second: ParticipantId,
    ) -> ParticipantResult<i64> {
        if first == second {
            return Err(ParticipantError::SelfPairing);
        }

        let mut tx = self.pool.begin().await?;

        let tournament_id = {
            let first_tournament = tournament_of(&mut tx, first).await?;
            let second_tournament = tournament_of(&mut tx, second).await?;
            if first_tournament != second_tournament {
                return Err(ParticipantError::DifferentTournaments);
            }
            first_tournament
        };

        // Tournament first, then participants; DID allocation is serialised here
        lock_tournament(&mut tx, tournament_id, true).await?;
        let rows = sqlx::query(
            "SELECT id, did FROM participants WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(vec![first, second])
        .fetch_all(&mut *tx)
        .await?;
        for id in [first, second] {
            if !rows.iter().any(|row| row.get::<i64, _>("id") == id) {
                return Err(ParticipantError::NotFound(id));
            }
        }

        for row in &rows {
            let id: i64 = row.get("id");
            if let Some(did) = row.get::<Option<i64>, _>("did") {
                let shared = sqlx::query(
                    "SELECT 1 FROM participants WHERE tournament_id = $1 AND did = $2 AND id <> $3",
                )
                .bind(tournament_id)
                .bind(did)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
                if shared {
                    return Err(ParticipantError::AlreadyPaired(id));
                }
            }
        }

        let did: i64 = sqlx::query(
            "SELECT COALESCE(MAX(did), 0) + 1 AS next_did FROM participants WHERE tournament_id = $1",
        )
        .bind(tournament_id)
        .fetch_one(&mut *tx)
        .await?
        .get("next_did");

        sqlx::query("UPDATE participants SET did = $1, updated_at = NOW() WHERE id = ANY($2)")
            .bind(did)
            .bind(vec![first, second])
            .execute(&mut *tx)
            .await?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::DoublesPaired)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_participant(first)
                .with_details(serde_json::json!({ "did": did, "partner_id": second })),
        )
        .await?;

        tx.commit().await?;
        log::info!("Paired participants {first} and {second} as DID {did}");
        Ok(did)
    }

    /// Dissolve the doubles pair `participant_id` belongs to
    pub async fn unpair(
        &self,
        admin_id: Option<i64>,
        participant_id: ParticipantId,
    ) -> ParticipantResult<()> {
        let mut tx = self.pool.begin().await?;

        let tournament_id = tournament_of(&mut tx, participant_id).await?;
        lock_tournament(&mut tx, tournament_id, true).await?;
        let did = lock_participant(&mut tx, participant_id)
            .await?
            .ok_or(ParticipantError::NotPaired(participant_id))?;

        let released: Vec<i64> = sqlx::query(
            "UPDATE participants SET did = NULL, updated_at = NOW() WHERE tournament_id = $1 AND did = $2 RETURNING id",
        )
        .bind(tournament_id)
        .bind(did)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.get("id"))
        .collect();

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::DoublesUnpaired)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_participant(participant_id)
                .with_details(serde_json::json!({ "did": did, "participants": released })),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The other participant sharing this participant's DID, if any
    pub async fn doubles_partner(
        &self,
        participant_id: ParticipantId,
    ) -> ParticipantResult<Option<Participant>> {
        let participant = self.get(participant_id).await?;
        let Some(did) = participant.did else {
            return Ok(None);
        };

        let row = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE tournament_id = $1 AND did = $2 AND id <> $3 ORDER BY id LIMIT 1"
        ))
        .bind(participant.tournament_id)
        .bind(did)
        .bind(participant_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.as_ref().map(participant_from_row))
    }

    pub async fn create_team(
        &self,
        admin_id: Option<i64>,
        tournament_id: i64,
        name: &str,
        legacy_tid: Option<i64>,
    ) -> ParticipantResult<Team> {
        let name = name.trim();
        if name.is_empty() || name.len() > 100 {
            return Err(ParticipantError::Validation(
                "Team name must be 1-100 characters".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let tournament_exists = sqlx::query("SELECT 1 FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !tournament_exists {
            return Err(ParticipantError::TournamentNotFound(tournament_id));
        }

        let team = insert_team(&mut tx, tournament_id, name, legacy_tid)
            .await?
            .ok_or_else(|| ParticipantError::TeamNameTaken(name.to_string()))?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::TeamCreated)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_details(serde_json::json!({ "team_id": team.id, "name": team.name })),
        )
        .await?;

        tx.commit().await?;
        Ok(team)
    }

    pub async fn list_teams(&self, tournament_id: i64) -> ParticipantResult<Vec<Team>> {
        let rows = sqlx::query(
            "SELECT id, tournament_id, name, legacy_tid FROM teams WHERE tournament_id = $1 ORDER BY name",
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.iter().map(team_from_row).collect())
    }

    /// Put a participant on a team, or take them off with `None`
    pub async fn assign_team(
        &self,
        admin_id: Option<i64>,
        participant_id: ParticipantId,
        team_id: Option<i64>,
    ) -> ParticipantResult<Participant> {
        let mut tx = self.pool.begin().await?;

        let tournament_id: i64 =
            sqlx::query("SELECT tournament_id FROM participants WHERE id = $1 FOR UPDATE")
                .bind(participant_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(ParticipantError::NotFound(participant_id))?
                .get("tournament_id");
        if let Some(team_id) = team_id {
            ensure_team_in_tournament(&mut tx, tournament_id, team_id).await?;
        }

        let row = sqlx::query(&format!(
            "UPDATE participants SET team_id = $1, updated_at = NOW() WHERE id = $2 RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(team_id)
        .bind(participant_id)
        .fetch_one(&mut *tx)
        .await?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::TeamAssigned)
                .with_tournament(tournament_id)
                .with_admin(admin_id)
                .with_participant(participant_id)
                .with_details(serde_json::json!({ "team_id": team_id })),
        )
        .await?;

        tx.commit().await?;
        Ok(participant_from_row(&row))
    }

    /// Filtered, sorted, paginated participant listing
    pub async fn search(&self, filter: &ParticipantFilter) -> ParticipantResult<Vec<Participant>> {
        let rows = build_search_query(filter)
            .build()
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(rows.iter().map(participant_from_row).collect())
    }
}

/// Tournaments a tournament admin may touch; empty for everyone else
async fn assigned_tournaments(
    conn: &mut PgConnection,
    principal: &Principal,
) -> ParticipantResult<Vec<i64>> {
    match principal {
        Principal::Admin {
            id,
            role: AdminRole::TournamentAdmin,
        } => {
            let rows = sqlx::query("SELECT tournament_id FROM admin_tournaments WHERE admin_id = $1")
                .bind(*id)
                .fetch_all(conn)
                .await?;
            Ok(rows.iter().map(|row| row.get("tournament_id")).collect())
        }
        _ => Ok(Vec::new()),
    }
}

/// Tournament a participant belongs to; never changes, so read unlocked
async fn tournament_of(conn: &mut PgConnection, participant_id: ParticipantId) -> ParticipantResult<i64> {
    let row = sqlx::query("SELECT tournament_id FROM participants WHERE id = $1")
        .bind(participant_id)
        .fetch_optional(conn)
        .await?
        .ok_or(ParticipantError::NotFound(participant_id))?;
    Ok(row.get("tournament_id"))
}

/// Lock a tournament row and return its state
///
/// Taken before any participant row lock. Imports hold the exclusive lock
/// for their whole transaction; DID changes need it too. Other edits only
/// need to keep the tournament from changing under them.
async fn lock_tournament(
    conn: &mut PgConnection,
    tournament_id: i64,
    exclusive: bool,
) -> ParticipantResult<String> {
    let sql = if exclusive {
        "SELECT state FROM tournaments WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT state FROM tournaments WHERE id = $1 FOR SHARE"
    };
    let row = sqlx::query(sql)
        .bind(tournament_id)
        .fetch_optional(conn)
        .await?
        .ok_or(ParticipantError::TournamentNotFound(tournament_id))?;
    Ok(row.get("state"))
}

/// Lock a participant row, returning its current DID
async fn lock_participant(
    conn: &mut PgConnection,
    participant_id: ParticipantId,
) -> ParticipantResult<Option<i64>> {
    let row = sqlx::query("SELECT did FROM participants WHERE id = $1 FOR UPDATE")
        .bind(participant_id)
        .fetch_optional(conn)
        .await?
        .ok_or(ParticipantError::NotFound(participant_id))?;
    Ok(row.get("did"))
}

/// Whether `did` can take one more participant besides `except`
///
/// Callers hold the tournament lock exclusively.
pub(crate) async fn did_has_room(
    conn: &mut PgConnection,
    tournament_id: i64,
    did: i64,
    except: Option<ParticipantId>,
) -> Result<bool, sqlx::Error> {
    let holders: i64 = sqlx::query(
        "SELECT COUNT(*) AS holders FROM participants WHERE tournament_id = $1 AND did = $2 AND id <> COALESCE($3, 0)",
    )
    .bind(tournament_id)
    .bind(did)
    .bind(except)
    .fetch_one(conn)
    .await?
    .get("holders");
    Ok(holders < 2)
}

async fn ensure_did_has_room(
    conn: &mut PgConnection,
    tournament_id: i64,
    did: i64,
    except: Option<ParticipantId>,
) -> ParticipantResult<()> {
    if !did_has_room(conn, tournament_id, did, except).await? {
        return Err(ParticipantError::DoublesPairFull(did));
    }
    Ok(())
}

/// A lost race on `(tournament_id, pid)` is the same conflict the pre-check reports
fn pid_conflict(err: sqlx::Error, pid: Option<i64>) -> ParticipantError {
    match (unique_violation(&err), pid) {
        (Some("participants_tournament_id_pid_key"), Some(pid)) => ParticipantError::PidTaken(pid),
        _ => ParticipantError::Database(err),
    }
}

async fn ensure_pid_free(
    conn: &mut PgConnection,
    tournament_id: i64,
    pid: i64,
    except: Option<ParticipantId>,
) -> ParticipantResult<()> {
    let taken = sqlx::query(
        "SELECT 1 FROM participants WHERE tournament_id = $1 AND pid = $2 AND id <> COALESCE($3, 0)",
    )
    .bind(tournament_id)
    .bind(pid)
    .bind(except)
    .fetch_optional(conn)
    .await?
    .is_some();
    if taken {
        return Err(ParticipantError::PidTaken(pid));
    }
    Ok(())
}

async fn ensure_team_in_tournament(
    conn: &mut PgConnection,
    tournament_id: i64,
    team_id: i64,
) -> ParticipantResult<()> {
    let found = sqlx::query("SELECT 1 FROM teams WHERE id = $1 AND tournament_id = $2")
        .bind(team_id)
        .bind(tournament_id)
        .fetch_optional(conn)
        .await?
        .is_some();
    if !found {
        return Err(ParticipantError::TeamNotFound(team_id));
    }
    Ok(())
}

/// Insert a team; `None` when the name is already taken in the tournament
pub(crate) async fn insert_team(
    conn: &mut PgConnection,
    tournament_id: i64,
    name: &str,
    legacy_tid: Option<i64>,
) -> Result<Option<Team>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO teams (tournament_id, name, legacy_tid)
        VALUES ($1, $2, $3)
        ON CONFLICT (tournament_id, name) DO NOTHING
        RETURNING id, tournament_id, name, legacy_tid
        "#,
    )
    .bind(tournament_id)
    .bind(name)
    .bind(legacy_tid)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(team_from_row))
}

/// Build the `UPDATE participants` statement for the fields present in `update`
pub(crate) fn build_update_query(
    participant_id: ParticipantId,
    update: &ProfileUpdate,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE participants SET updated_at = NOW()");

    let text_fields = [
        ("nickname", &update.nickname),
        ("phone", &update.phone),
        ("city", &update.city),
        ("state", &update.state),
        ("country", &update.country),
        ("usbc_id", &update.usbc_id),
    ];
    for (column, value) in text_fields {
        if let Some(value) = value {
            qb.push(format!(", {column} = "))
                .push_bind(clean_text(Some(value)));
        }
    }
    if let Some(email) = &update.email {
        qb.push(", email = ").push_bind(clean_email(Some(email)));
    }
    if let Some(first_name) = &update.first_name {
        qb.push(", first_name = ")
            .push_bind(first_name.trim().to_string());
    }
    if let Some(last_name) = &update.last_name {
        qb.push(", last_name = ").push_bind(last_name.trim().to_string());
    }
    // `Some(None)` binds NULL
    if let Some(birth_date) = update.birth_date {
        qb.push(", birth_date = ").push_bind(birth_date);
    }
    if let Some(average) = update.average {
        qb.push(", average = ").push_bind(average);
    }
    let numbers = [
        ("pid", update.pid),
        ("did", update.did),
        ("team_id", update.team_id),
    ];
    for (column, value) in numbers {
        if let Some(value) = value {
            qb.push(format!(", {column} = ")).push_bind(value);
        }
    }

    qb.push(" WHERE id = ").push_bind(participant_id);
    qb.push(" RETURNING ").push(PARTICIPANT_COLUMNS);
    qb
}

/// Build the participant search query
///
/// Every user-supplied value is bound; the ORDER BY clause comes from
/// [`ParticipantSort`](super::models::ParticipantSort).
pub(crate) fn build_search_query(filter: &ParticipantFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(PARTICIPANT_COLUMNS);
    qb.push(" FROM participants p WHERE p.tournament_id = ")
        .push_bind(filter.tournament_id);

    if let Some(name) = filter.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let pattern = like_pattern(name);
        qb.push(" AND (p.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.nickname ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(email) = filter.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        qb.push(" AND p.email ILIKE ").push_bind(like_pattern(email));
    }
    if let Some(team_id) = filter.team_id {
        qb.push(" AND p.team_id = ").push_bind(team_id);
    }
    if let Some(has_partner) = filter.has_partner {
        qb.push(if has_partner { " AND " } else { " AND NOT " });
        qb.push(
            "EXISTS (SELECT 1 FROM participants o WHERE o.tournament_id = p.tournament_id \
             AND o.did = p.did AND o.id <> p.id)",
        );
    }
    if filter.missing_average {
        qb.push(" AND p.average IS NULL");
    }

    qb.push(" ORDER BY ")
        .push(filter.sort.order_by(filter.descending));
    qb.push(" LIMIT ").push_bind(filter.effective_limit());
    qb.push(" OFFSET ").push_bind(filter.effective_offset());
    qb
}

/// `%value%` with LIKE metacharacters escaped
fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clean_email(value: Option<&str>) -> Option<String> {
    clean_text(value).map(|email| email.to_lowercase())
}

pub(crate) fn participant_from_row(row: &PgRow) -> Participant {
    Participant {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        pid: row.get("pid"),
        did: row.get("did"),
        team_id: row.get("team_id"),
        identifier: row.get("identifier"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        nickname: row.get("nickname"),
        email: row.get("email"),
        phone: row.get("phone"),
        birth_date: row.get("birth_date"),
        city: row.get("city"),
        state: row.get("state"),
        country: row.get("country"),
        usbc_id: row.get("usbc_id"),
        average: row.get("average"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

pub(crate) fn team_from_row(row: &PgRow) -> Team {
    Team {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        name: row.get("name"),
        legacy_tid: row.get("legacy_tid"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::models::ParticipantSort;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("lee"), "%lee%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_search_query_minimal() {
        let query = build_search_query(&ParticipantFilter::for_tournament(3));
        assert_eq!(
            query.sql(),
            format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participants p WHERE p.tournament_id = $1 \
                 ORDER BY last_name ASC, first_name ASC, id ASC LIMIT $2 OFFSET $3"
            )
        );
    }

    #[test]
    fn test_search_query_all_filters() {
        let filter = ParticipantFilter {
            tournament_id: 3,
            name: Some("ann".to_string()),
            email: Some("example.com".to_string()),
            team_id: Some(9),
            has_partner: Some(false),
            missing_average: true,
            sort: ParticipantSort::Pid,
            descending: true,
            limit: Some(25),
            offset: Some(50),
        };
        let query = build_search_query(&filter);
        let sql = query.sql();
        assert!(sql.contains("(p.first_name ILIKE $2 OR p.last_name ILIKE $3 OR p.nickname ILIKE $4)"));
        assert!(sql.contains("AND p.email ILIKE $5"));
        assert!(sql.contains("AND p.team_id = $6"));
        assert!(sql.contains("AND NOT EXISTS (SELECT 1 FROM participants o"));
        assert!(sql.contains("AND p.average IS NULL"));
        assert!(sql.ends_with("ORDER BY pid DESC NULLS LAST, id DESC LIMIT $7 OFFSET $8"));
    }

    #[test]
    fn test_blank_name_filter_ignored() {
        let filter = ParticipantFilter {
            name: Some("   ".to_string()),
            ..ParticipantFilter::for_tournament(1)
        };
        let query = build_search_query(&filter);
        assert!(!query.sql().contains("ILIKE"));
    }

    #[test]
    fn test_update_query_clears_and_sets() {
        let update = ProfileUpdate {
            phone: Some(String::new()),
            email: Some("Ann@Example.com".to_string()),
            average: Some(Some(181)),
            did: Some(None),
            ..Default::default()
        };
        let query = build_update_query(12, &update);
        assert_eq!(
            query.sql(),
            format!(
                "UPDATE participants SET updated_at = NOW(), phone = $1, email = $2, average = $3, \
                 did = $4 WHERE id = $5 RETURNING {PARTICIPANT_COLUMNS}"
            )
        );
    }

    #[test]
    fn test_clean_values() {
        assert_eq!(clean_text(Some("  ")), None);
        assert_eq!(clean_text(Some(" Reno ")), Some("Reno".to_string()));
        assert_eq!(
            clean_email(Some(" Ann@Example.COM")),
            Some("ann@example.com".to_string())
        );
    }
}
