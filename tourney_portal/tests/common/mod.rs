//! Shared helpers for database-backed integration tests.
//!
//! Tests return early when `DATABASE_URL` is not set.

#![allow(dead_code)]

use sqlx::PgPool;
use std::sync::Arc;
use tourney_portal::{
    auth::{AdminRole, Principal},
    db::{Database, DatabaseConfig},
    tournament::{NewTournament, Tournament, TournamentManager, TournamentState},
};

pub const PEPPER: &str = "integration_test_pepper";
pub const SESSION_SECRET: &str = "integration_test_session_secret_0123456789";

pub const SUPER_ADMIN: Principal = Principal::Admin {
    id: 0,
    role: AdminRole::SuperAdmin,
};

/// Connect and migrate, or `None` without `DATABASE_URL`
pub async fn setup_test_db() -> Option<Arc<PgPool>> {
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to run migrations");

    Some(Arc::new(db.pool().clone()))
}

/// Unique suffix so parallel tests never collide
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Fresh tournament in `state`, walking the lifecycle to get there
pub async fn create_tournament(pool: &Arc<PgPool>, state: TournamentState) -> Tournament {
    let tournaments = TournamentManager::new(pool.clone());
    let tournament = tournaments
        .create(
            None,
            NewTournament {
                identifier: unique("t"),
                name: "Integration Classic".to_string(),
                year: 2025,
                location: None,
                start_date: None,
                end_date: None,
                entry_deadline: None,
                handicap: None,
            },
        )
        .await
        .expect("Failed to create tournament");

    let path: &[TournamentState] = match state {
        TournamentState::Setup => &[],
        TournamentState::Open => &[TournamentState::Open],
        TournamentState::Closed => &[TournamentState::Open, TournamentState::Closed],
        TournamentState::Active => &[
            TournamentState::Open,
            TournamentState::Closed,
            TournamentState::Active,
        ],
        TournamentState::Completed => &[
            TournamentState::Open,
            TournamentState::Closed,
            TournamentState::Active,
            TournamentState::Completed,
        ],
    };

    let mut tournament = tournament;
    for &next in path {
        tournament = tournaments
            .transition(None, tournament.id, next)
            .await
            .expect("Failed to transition tournament");
    }
    tournament
}
