//! Tournament module: lifecycle, configuration and handicap rules.
//!
//! A tournament moves `Setup -> Open -> Closed -> Active -> Completed`;
//! registration may be re-opened from `Closed`. Bowlers edit their own
//! profiles only while it is `Open`.
//!
//! ## Example
//!
//! ```no_run
//! use tourney_portal::tournament::{NewTournament, TournamentManager, TournamentState};
//! use tourney_portal::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let tournaments = TournamentManager::new(Arc::new(db.pool().clone()));
//!
//!     let tournament = tournaments
//!         .create(
//!             None,
//!             NewTournament {
//!                 identifier: "spring-classic-2025".to_string(),
//!                 name: "Spring Classic".to_string(),
//!                 year: 2025,
//!                 location: Some("Reno, NV".to_string()),
//!                 start_date: None,
//!                 end_date: None,
//!                 entry_deadline: None,
//!                 handicap: None,
//!             },
//!         )
//!         .await?;
//!     tournaments.transition(None, tournament.id, TournamentState::Open).await?;
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod models;

pub use manager::{TournamentError, TournamentManager, TournamentResult};
pub use models::{
    HandicapRule, NewTournament, StateTransition, Tournament, TournamentId, TournamentState,
    TournamentUpdate, validate_identifier,
};
