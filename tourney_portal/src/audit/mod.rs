//! Append-only audit log of administrative and participant changes.
//!
//! Every mutating operation in the other managers writes an entry through
//! [`AuditLog::record`] using the same transaction as the change itself, so
//! an entry exists exactly when the change committed.
//!
//! ## Example
//!
//! ```no_run
//! use tourney_portal::audit::{AuditAction, AuditFilter, AuditLog, NewAuditEntry};
//! use tourney_portal::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let log = AuditLog::new(Arc::new(db.pool().clone()));
//!
//!     AuditLog::record(
//!         db.pool(),
//!         &NewAuditEntry::new(AuditAction::TournamentUpdated).with_tournament(1),
//!     )
//!     .await?;
//!
//!     let recent = log.list(&AuditFilter::for_tournament(1)).await?;
//!     println!("{} entries", recent.len());
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod models;

pub use manager::{AuditError, AuditLog, AuditResult};
pub use models::{AuditAction, AuditEntry, AuditFilter, NewAuditEntry};
