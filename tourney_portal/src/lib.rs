//! # Tourney Portal
//!
//! Registration and administration for bowling tournaments.
//!
//! The library owns everything that touches the database: staff and
//! participant authentication, tournament setup, participant records and
//! doubles/team assignments, CSV/XML imports, standings and the audit log.
//! The HTTP surface lives in the `tp_server` crate.
//!
//! ## Core Modules
//!
//! - [`auth`]: Admin login, passwordless participant login, session tokens and guards
//! - [`tournament`]: Tournament lifecycle and handicap rules
//! - [`participant`]: Bowler records, profile editing, doubles pairing, teams, search
//! - [`import`]: CSV registration and CSV/XML score imports with record matching
//! - [`standings`]: Scratch/handicap totals and competition ranking per event
//! - [`audit`]: Append-only log of administrative changes
//! - [`security`]: Login rate limiting
//! - [`db`]: Connection pooling and migrations
//!
//! ## Example
//!
//! ```no_run
//! use tourney_portal::db::{Database, DatabaseConfig};
//! use tourney_portal::standings::{Event, StandingsManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let standings = StandingsManager::new(Arc::new(db.pool().clone()));
//!     for row in standings.compute(1, Event::Singles).await? {
//!         println!("{:>3} {:<30} {}", row.rank, row.name, row.total);
//!     }
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod auth;
pub mod db;
pub mod import;
pub mod participant;
pub mod security;
pub mod standings;
pub mod tournament;
