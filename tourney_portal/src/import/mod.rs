//! CSV and XML imports.
//!
//! - Registration CSV: one bowler per row, loosely named headers.
//! - Score CSV: one game per row (`event, game, score`) or one event per row
//!   (`event, game1, game2, game3`).
//! - Score XML: the lane-scoring export (`<scores><bowler><game>`).
//!
//! Rows are matched to existing participants by PID, USBC ID, email and
//! finally normalised name (see [`matching`]). Each file is applied in one
//! transaction and recorded by SHA-256 digest so the same file cannot be
//! applied twice. Rows that cannot be used are returned in
//! [`ImportReport::skipped`] instead of failing the import.

pub mod errors;
pub mod manager;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod registration;
pub mod scores;

pub use errors::{ImportError, ImportResult};
pub use manager::{ImportManager, file_digest};
pub use matching::{Candidate, MatchOutcome, MatchedBy, Matcher, RowKey};
pub use models::{ImportKind, ImportReport, RegistrationRow, RowError, ScoreFormat, ScoreRow};
pub use registration::parse_registrations;
pub use scores::{parse_score_csv, parse_score_xml};
