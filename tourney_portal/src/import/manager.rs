//! Applies parsed import files to the database.

use super::{
    errors::{ImportError, ImportResult},
    matching::{Candidate, MatchOutcome, Matcher, RowKey},
    models::{ImportKind, ImportReport, RegistrationRow, RowError, ScoreFormat, ScoreRow},
    registration::parse_registrations,
    scores::{parse_score_csv, parse_score_xml},
};
use crate::{
    audit::{AuditAction, AuditLog, NewAuditEntry},
    participant::{
        generate_identifier,
        manager::{did_has_room, insert_team},
    },
    tournament::TournamentState,
};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool, Row};
use std::{collections::HashMap, sync::Arc};

/// Import manager
#[derive(Clone)]
pub struct ImportManager {
    pool: Arc<PgPool>,
}

impl ImportManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Import a registration CSV
    ///
    /// Rows matching an existing participant update the fields present in
    /// the row; unmatched rows create participants. Teams are created by name
    /// on first sight. Everything commits in one transaction.
    pub async fn import_registrations(
        &self,
        admin_id: Option<i64>,
        tournament_id: i64,
        data: &[u8],
    ) -> ImportResult<ImportReport> {
        let mut tx = self.pool.begin().await?;

        let (_, state) = lock_tournament(&mut tx, tournament_id).await?;
        if state == TournamentState::Completed {
            return Err(ImportError::TournamentCompleted);
        }

        let (rows, parse_errors) = parse_registrations(data)?;
        let digest = record_batch(&mut tx, tournament_id, ImportKind::Registrations, admin_id, data).await?;

        let mut matcher = Matcher::new(load_candidates(&mut tx, tournament_id).await?);
        let mut teams = load_teams(&mut tx, tournament_id).await?;
        let mut report = ImportReport {
            skipped: parse_errors,
            ..Default::default()
        };

        for row in rows {
            let key = RowKey {
                pid: row.pid,
                usbc_id: row.usbc_id.as_deref(),
                email: row.email.as_deref(),
                first_name: Some(&row.first_name),
                last_name: Some(&row.last_name),
            };

            let matched = match matcher.find(&key) {
                MatchOutcome::Matched(id, _) => Some(id),
                MatchOutcome::NoMatch => None,
                MatchOutcome::Ambiguous(ids) => {
                    report.skipped.push(RowError::new(
                        row.line,
                        format!(
                            "{} {} matches {} participants by name; add a PID, USBC ID or email",
                            row.first_name,
                            row.last_name,
                            ids.len()
                        ),
                    ));
                    continue;
                }
            };

            if let Some(did) = row.did {
                if !did_has_room(&mut tx, tournament_id, did, matched).await? {
                    report.skipped.push(RowError::new(
                        row.line,
                        format!("DID {did} already has two participants"),
                    ));
                    continue;
                }
            }

            let team_id = match row.team.as_deref() {
                Some(name) => Some(resolve_team(&mut tx, &mut teams, tournament_id, name).await?),
                None => None,
            };

            let participant_id = match matched {
                Some(id) => {
                    update_participant(&mut tx, id, &row, team_id).await?;
                    report.updated += 1;
                    id
                }
                None => {
                    let id = insert_participant(&mut tx, tournament_id, &row, team_id).await?;
                    report.created += 1;
                    id
                }
            };

            let indexed = indexed_after_write(matcher.get(participant_id), participant_id, &row);
            matcher.insert(indexed);
        }

        finish(&mut tx, admin_id, tournament_id, ImportKind::Registrations, &digest, &mut report).await?;
        tx.commit().await?;

        log::info!(
            "Registration import for tournament {}: {} created, {} updated, {} skipped",
            tournament_id,
            report.created,
            report.updated,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Import game scores from CSV or the lane-scoring XML export
    pub async fn import_scores(
        &self,
        admin_id: Option<i64>,
        tournament_id: i64,
        format: ScoreFormat,
        data: &[u8],
    ) -> ImportResult<ImportReport> {
        let mut tx = self.pool.begin().await?;

        let (identifier, _) = lock_tournament(&mut tx, tournament_id).await?;
        let (rows, parse_errors) = match format {
            ScoreFormat::Csv => parse_score_csv(data)?,
            ScoreFormat::Xml => parse_score_xml(data, &identifier)?,
        };
        let digest = record_batch(&mut tx, tournament_id, ImportKind::Scores, admin_id, data).await?;

        let matcher = Matcher::new(load_candidates(&mut tx, tournament_id).await?);
        let mut report = ImportReport {
            skipped: parse_errors,
            ..Default::default()
        };

        for row in rows {
            let key = RowKey {
                pid: row.pid,
                first_name: row.first_name.as_deref(),
                last_name: row.last_name.as_deref(),
                ..Default::default()
            };

            match matcher.find(&key) {
                MatchOutcome::Matched(participant_id, _) => {
                    upsert_score(&mut tx, participant_id, &row).await?;
                    report.scores += 1;
                }
                MatchOutcome::Ambiguous(ids) => report.skipped.push(RowError::new(
                    row.line,
                    format!("Bowler matches {} participants by name", ids.len()),
                )),
                MatchOutcome::NoMatch => report
                    .skipped
                    .push(RowError::new(row.line, describe_unmatched(&row))),
            }
        }

        finish(&mut tx, admin_id, tournament_id, ImportKind::Scores, &digest, &mut report).await?;
        tx.commit().await?;

        log::info!(
            "Score import for tournament {}: {} scores, {} skipped",
            tournament_id,
            report.scores,
            report.skipped.len()
        );
        Ok(report)
    }
}

/// SHA-256 of the raw file, hex encoded
pub fn file_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

async fn lock_tournament(
    conn: &mut PgConnection,
    tournament_id: i64,
) -> ImportResult<(String, TournamentState)> {
    let row = sqlx::query("SELECT identifier, state FROM tournaments WHERE id = $1 FOR UPDATE")
        .bind(tournament_id)
        .fetch_optional(conn)
        .await?
        .ok_or(ImportError::TournamentNotFound(tournament_id))?;
    let state: String = row.get("state");
    let state = state.parse().map_err(|state| {
        ImportError::Database(sqlx::Error::Decode(
            format!("unknown tournament state {state:?}").into(),
        ))
    })?;
    Ok((row.get("identifier"), state))
}

/// Record the file in `import_batches`, rejecting a byte-identical re-import
async fn record_batch(
    conn: &mut PgConnection,
    tournament_id: i64,
    kind: ImportKind,
    admin_id: Option<i64>,
    data: &[u8],
) -> ImportResult<String> {
    let digest = file_digest(data);
    let inserted = sqlx::query(
        r#"
        INSERT INTO import_batches (tournament_id, kind, digest, admin_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (tournament_id, kind, digest) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(tournament_id)
    .bind(kind.as_str())
    .bind(&digest)
    .bind(admin_id)
    .fetch_optional(conn)
    .await?;

    if inserted.is_none() {
        return Err(ImportError::DuplicateImport);
    }
    Ok(digest)
}

async fn finish(
    conn: &mut PgConnection,
    admin_id: Option<i64>,
    tournament_id: i64,
    kind: ImportKind,
    digest: &str,
    report: &mut ImportReport,
) -> ImportResult<()> {
    report.skipped.sort_by_key(|e| e.line);
    AuditLog::record(
        conn,
        &NewAuditEntry::new(AuditAction::ImportApplied)
            .with_tournament(tournament_id)
            .with_admin(admin_id)
            .with_details(serde_json::json!({
                "kind": kind,
                "digest": digest,
                "created": report.created,
                "updated": report.updated,
                "scores": report.scores,
                "skipped": report.skipped.len(),
            })),
    )
    .await?;
    Ok(())
}

async fn load_candidates(
    conn: &mut PgConnection,
    tournament_id: i64,
) -> ImportResult<Vec<Candidate>> {
    let rows = sqlx::query(
        "SELECT id, pid, usbc_id, email, first_name, last_name FROM participants WHERE tournament_id = $1",
    )
    .bind(tournament_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Candidate {
            id: row.get("id"),
            pid: row.get("pid"),
            usbc_id: row.get("usbc_id"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
        })
        .collect())
}

/// Team IDs keyed by lowercased name
async fn load_teams(
    conn: &mut PgConnection,
    tournament_id: i64,
) -> ImportResult<HashMap<String, i64>> {
    let rows = sqlx::query("SELECT id, name FROM teams WHERE tournament_id = $1")
        .bind(tournament_id)
        .fetch_all(conn)
        .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get::<String, _>("name").to_lowercase(), row.get("id")))
        .collect())
}

async fn resolve_team(
    conn: &mut PgConnection,
    teams: &mut HashMap<String, i64>,
    tournament_id: i64,
    name: &str,
) -> ImportResult<i64> {
    let key = name.trim().to_lowercase();
    if let Some(&id) = teams.get(&key) {
        return Ok(id);
    }

    let id = match insert_team(&mut *conn, tournament_id, name.trim(), None).await? {
        Some(team) => team.id,
        None => sqlx::query("SELECT id FROM teams WHERE tournament_id = $1 AND name = $2")
            .bind(tournament_id)
            .bind(name.trim())
            .fetch_one(&mut *conn)
            .await?
            .get("id"),
    };
    teams.insert(key, id);
    Ok(id)
}

async fn update_participant(
    conn: &mut PgConnection,
    participant_id: i64,
    row: &RegistrationRow,
    team_id: Option<i64>,
) -> ImportResult<()> {
    sqlx::query(
        r#"
        UPDATE participants SET
            first_name = $2,
            last_name = $3,
            pid = COALESCE($4, pid),
            did = COALESCE($5, did),
            team_id = COALESCE($6, team_id),
            nickname = COALESCE($7, nickname),
            email = COALESCE($8, email),
            phone = COALESCE($9, phone),
            birth_date = COALESCE($10, birth_date),
            city = COALESCE($11, city),
            state = COALESCE($12, state),
            country = COALESCE($13, country),
            usbc_id = COALESCE($14, usbc_id),
            average = COALESCE($15, average),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(participant_id)
    .bind(&row.first_name)
    .bind(&row.last_name)
    .bind(row.pid)
    .bind(row.did)
    .bind(team_id)
    .bind(&row.nickname)
    .bind(row.email.as_deref().map(str::to_lowercase))
    .bind(&row.phone)
    .bind(row.birth_date)
    .bind(&row.city)
    .bind(&row.state)
    .bind(&row.country)
    .bind(&row.usbc_id)
    .bind(row.average)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_participant(
    conn: &mut PgConnection,
    tournament_id: i64,
    row: &RegistrationRow,
    team_id: Option<i64>,
) -> ImportResult<i64> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO participants (tournament_id, pid, did, team_id, identifier, first_name,
                                  last_name, nickname, email, phone, birth_date, city, state,
                                  country, usbc_id, average)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING id
        "#,
    )
    .bind(tournament_id)
    .bind(row.pid)
    .bind(row.did)
    .bind(team_id)
    .bind(generate_identifier())
    .bind(&row.first_name)
    .bind(&row.last_name)
    .bind(&row.nickname)
    .bind(row.email.as_deref().map(str::to_lowercase))
    .bind(&row.phone)
    .bind(row.birth_date)
    .bind(&row.city)
    .bind(&row.state)
    .bind(&row.country)
    .bind(&row.usbc_id)
    .bind(row.average)
    .fetch_one(conn)
    .await?;
    Ok(inserted.get("id"))
}

async fn upsert_score(conn: &mut PgConnection, participant_id: i64, row: &ScoreRow) -> ImportResult<()> {
    sqlx::query(
        r#"
        INSERT INTO scores (participant_id, event, game, score)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (participant_id, event, game)
        DO UPDATE SET score = EXCLUDED.score, updated_at = NOW()
        "#,
    )
    .bind(participant_id)
    .bind(row.event.as_str())
    .bind(row.game)
    .bind(row.score)
    .execute(conn)
    .await?;
    Ok(())
}

/// Identifying fields of a participant after `row` was written to it
///
/// Mirrors `update_participant`: names are replaced, other keys only when
/// the row carries them.
fn indexed_after_write(
    previous: Option<&Candidate>,
    id: i64,
    row: &RegistrationRow,
) -> Candidate {
    Candidate {
        id,
        pid: row.pid.or_else(|| previous.and_then(|c| c.pid)),
        usbc_id: row
            .usbc_id
            .clone()
            .or_else(|| previous.and_then(|c| c.usbc_id.clone())),
        email: row
            .email
            .as_deref()
            .map(str::to_lowercase)
            .or_else(|| previous.and_then(|c| c.email.clone())),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
    }
}

fn describe_unmatched(row: &ScoreRow) -> String {
    match (row.pid, row.first_name.as_deref(), row.last_name.as_deref()) {
        (Some(pid), _, _) => format!("No participant with PID {pid}"),
        (None, Some(first), Some(last)) => format!("No participant named {first} {last}"),
        _ => "No matching participant".to_string(),
    }
}
