//! Loads tournament data and computes standings.

use super::{
    compute::compute_standings,
    models::{BowlerScores, Event, GameScore, StandingRow},
};
use crate::tournament::HandicapRule;
use sqlx::{PgPool, Row};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

/// Standings errors
#[derive(Debug, Error)]
pub enum StandingsError {
    #[error("Tournament not found: {0}")]
    TournamentNotFound(i64),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid score row: {0}")]
    InvalidScore(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StandingsResult<T> = Result<T, StandingsError>;

/// Standings manager
#[derive(Clone)]
pub struct StandingsManager {
    pool: Arc<PgPool>,
}

impl StandingsManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Ranked standings of `event` for a tournament
    pub async fn compute(&self, tournament_id: i64, event: Event) -> StandingsResult<Vec<StandingRow>> {
        let rule = self.handicap_rule(tournament_id).await?;
        let bowlers = self.load_bowlers(tournament_id).await?;
        Ok(compute_standings(&bowlers, &rule, event))
    }

    async fn handicap_rule(&self, tournament_id: i64) -> StandingsResult<HandicapRule> {
        let row = sqlx::query(
            "SELECT handicap_base, handicap_percent, handicap_max FROM tournaments WHERE id = $1",
        )
        .bind(tournament_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(StandingsError::TournamentNotFound(tournament_id))?;

        Ok(HandicapRule {
            base: row.get("handicap_base"),
            percent: row.get("handicap_percent"),
            max: row.get("handicap_max"),
        })
    }

    async fn load_bowlers(&self, tournament_id: i64) -> StandingsResult<Vec<BowlerScores>> {
        let participants = sqlx::query(
            r#"
            SELECT p.id, p.first_name, p.last_name, p.nickname, p.average, p.did, p.team_id,
                   t.name AS team_name
            FROM participants p
            LEFT JOIN teams t ON t.id = p.team_id
            WHERE p.tournament_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut bowlers = Vec::with_capacity(participants.len());
        let mut index = HashMap::with_capacity(participants.len());
        for row in &participants {
            let id: i64 = row.get("id");
            let first_name: String = row.get("first_name");
            let last_name: String = row.get("last_name");
            let nickname: Option<String> = row.get("nickname");
            let first = nickname.filter(|n| !n.is_empty()).unwrap_or(first_name);

            index.insert(id, bowlers.len());
            bowlers.push(BowlerScores {
                participant_id: id,
                name: format!("{first} {last_name}"),
                average: row.get("average"),
                did: row.get("did"),
                team_id: row.get("team_id"),
                team_name: row.get("team_name"),
                games: Vec::new(),
            });
        }

        let scores = sqlx::query(
            r#"
            SELECT s.participant_id, s.event, s.game, s.score
            FROM scores s
            JOIN participants p ON p.id = s.participant_id
            WHERE p.tournament_id = $1
            ORDER BY s.participant_id, s.event, s.game
            "#,
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        for row in &scores {
            let participant_id: i64 = row.get("participant_id");
            let event: String = row.get("event");
            let event = event.parse().map_err(StandingsError::InvalidScore)?;
            if let Some(&i) = index.get(&participant_id) {
                bowlers[i].games.push(GameScore {
                    event,
                    game: row.get("game"),
                    score: row.get("score"),
                });
            }
        }

        Ok(bowlers)
    }
}
