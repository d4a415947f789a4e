//! Authentication error types.

use thiserror::Error;

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Audit log write failed
    #[error("Audit error: {0}")]
    Audit(#[from] crate::audit::AuditError),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Email/password pair did not match an active account
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Account exists but has been deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// Admin not found
    #[error("Admin not found: {0}")]
    AdminNotFound(i64),

    /// Email already exists
    #[error("Email already exists")]
    EmailTaken,

    /// Invalid email format
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Name missing or too long
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Password too weak
    #[error("Password too weak: {0}")]
    WeakPassword(String),

    /// JWT token error
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    /// No session token was presented
    #[error("Not signed in")]
    Unauthenticated,

    /// Portal login link does not belong to any participant
    #[error("Invalid or expired login link")]
    InvalidLoginLink,

    /// Authenticated, but not allowed to do this
    #[error("Not allowed")]
    Forbidden,

    /// Tournament referenced by an assignment does not exist
    #[error("Tournament not found: {0}")]
    TournamentNotFound(i64),

    /// Update request carried no changes
    #[error("Nothing to update")]
    EmptyUpdate,
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database and JWT errors are sanitized to prevent information disclosure
    /// about the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Audit(_) | AuthError::HashingFailed => {
                "Internal server error".to_string()
            }
            AuthError::JwtError(_) => "Authentication failed".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_internals() {
        let err = AuthError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");

        let err = AuthError::WeakPassword("too short".to_string());
        assert_eq!(err.client_message(), "Password too weak: too short");
    }
}
