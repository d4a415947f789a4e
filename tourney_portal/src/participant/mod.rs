//! Participant module: bowler records, portal profile editing, doubles
//! pairing, teams and search.
//!
//! Participants sign in through a login link carrying their 16-character
//! identifier (see [`crate::auth::AuthManager::login_participant`]).

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{ParticipantError, ParticipantResult};
pub use manager::ParticipantManager;
pub use models::{
    IDENTIFIER_LEN, NewParticipant, Participant, ParticipantFilter, ParticipantId,
    ParticipantSort, ProfileUpdate, Team, generate_identifier, is_valid_identifier,
};
