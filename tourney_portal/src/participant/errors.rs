//! Participant error types.

use thiserror::Error;

/// Participant errors
#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("Participant not found: {0}")]
    NotFound(i64),

    #[error("Participant not found")]
    IdentifierNotFound,

    #[error("Tournament not found: {0}")]
    TournamentNotFound(i64),

    #[error("Team not found: {0}")]
    TeamNotFound(i64),

    #[error("Invalid participant: {0}")]
    Validation(String),

    #[error("Not allowed")]
    Forbidden,

    /// A participant tried to change fields only staff may change
    #[error("Only an administrator can change: {}", .0.join(", "))]
    AdminOnlyFields(Vec<&'static str>),

    #[error("Registration is closed; profile changes are no longer accepted")]
    RegistrationClosed,

    #[error("Participant number {0} is already used in this tournament")]
    PidTaken(i64),

    #[error("Team name already exists: {0}")]
    TeamNameTaken(String),

    #[error("Participants belong to different tournaments")]
    DifferentTournaments,

    #[error("A participant cannot be paired with themself")]
    SelfPairing,

    #[error("Participant {0} already has a doubles partner")]
    AlreadyPaired(i64),

    #[error("Participant {0} has no doubles partner")]
    NotPaired(i64),

    #[error("Doubles pair {0} already has two participants")]
    DoublesPairFull(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Audit error: {0}")]
    Audit(#[from] crate::audit::AuditError),
}

impl ParticipantError {
    /// Client-safe message
    pub fn client_message(&self) -> String {
        match self {
            ParticipantError::Database(_) | ParticipantError::Audit(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

pub type ParticipantResult<T> = Result<T, ParticipantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_only_message_lists_fields() {
        let err = ParticipantError::AdminOnlyFields(vec!["average", "pid"]);
        assert_eq!(err.to_string(), "Only an administrator can change: average, pid");
    }

    #[test]
    fn test_client_message_hides_database_errors() {
        let err = ParticipantError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(
            ParticipantError::RegistrationClosed.client_message(),
            ParticipantError::RegistrationClosed.to_string()
        );
    }
}
