//! Standings: scratch and handicap totals with competition ranking.
//!
//! Singles rank bowlers, doubles rank DID pairs, team ranks teams, and all
//! events ranks bowlers who completed all nine games. Handicap per game
//! follows the tournament's [`HandicapRule`](crate::tournament::HandicapRule).

pub mod compute;
pub mod manager;
pub mod models;

pub use compute::{compute_standings, rank_rows};
pub use manager::{StandingsError, StandingsManager, StandingsResult};
pub use models::{BowlerScores, Event, GameScore, ScoreEvent, StandingRow};
