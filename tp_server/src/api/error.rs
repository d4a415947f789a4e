//! Mapping of library errors onto HTTP responses.
//!
//! Every handler returns `Result<_, ApiError>`; the body is always
//! `{"error": "..."}` with internals stripped from 5xx messages.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tourney_portal::{
    audit::AuditError,
    auth::AuthError,
    import::ImportError,
    participant::ParticipantError,
    security::RateLimitError,
    standings::StandingsError,
    tournament::TournamentError,
};

const INTERNAL: &str = "Internal server error";

/// An error response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Seconds for the `Retry-After` header on 429 responses
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Permission denied")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Too many attempts, try again later".to_string(),
            retry_after,
        }
    }

    /// Log the underlying error and hide it from the client
    fn internal(error: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %error, "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "error": self.message }))).into_response();
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match &error {
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::InvalidLoginLink
            | AuthError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AuthError::AccountDisabled | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::AdminNotFound(_) | AuthError::TournamentNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidEmail(_)
            | AuthError::InvalidName(_)
            | AuthError::WeakPassword(_)
            | AuthError::EmptyUpdate => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Database(_) | AuthError::Audit(_) | AuthError::HashingFailed => {
                return Self::internal(&error);
            }
        };
        Self::new(status, error.client_message())
    }
}

impl From<TournamentError> for ApiError {
    fn from(error: TournamentError) -> Self {
        let status = match &error {
            TournamentError::NotFound(_) | TournamentError::IdentifierNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            TournamentError::IdentifierTaken(_)
            | TournamentError::InvalidTransition { .. }
            | TournamentError::NotInSetup(_) => StatusCode::CONFLICT,
            TournamentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TournamentError::Database(_) | TournamentError::Audit(_) => {
                return Self::internal(&error);
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<ParticipantError> for ApiError {
    fn from(error: ParticipantError) -> Self {
        let status = match &error {
            ParticipantError::NotFound(_)
            | ParticipantError::IdentifierNotFound
            | ParticipantError::TournamentNotFound(_)
            | ParticipantError::TeamNotFound(_) => StatusCode::NOT_FOUND,
            ParticipantError::Forbidden
            | ParticipantError::AdminOnlyFields(_)
            | ParticipantError::RegistrationClosed => StatusCode::FORBIDDEN,
            ParticipantError::PidTaken(_)
            | ParticipantError::TeamNameTaken(_)
            | ParticipantError::AlreadyPaired(_)
            | ParticipantError::NotPaired(_)
            | ParticipantError::DoublesPairFull(_) => StatusCode::CONFLICT,
            ParticipantError::Validation(_)
            | ParticipantError::DifferentTournaments
            | ParticipantError::SelfPairing => StatusCode::UNPROCESSABLE_ENTITY,
            ParticipantError::Database(_) | ParticipantError::Audit(_) => {
                return Self::internal(&error);
            }
        };
        Self::new(status, error.client_message())
    }
}

impl From<ImportError> for ApiError {
    fn from(error: ImportError) -> Self {
        let status = match &error {
            ImportError::Csv(_)
            | ImportError::Xml(_)
            | ImportError::InvalidEncoding
            | ImportError::MissingColumn(_)
            | ImportError::UnknownFormat(_) => StatusCode::BAD_REQUEST,
            ImportError::TournamentMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ImportError::TournamentNotFound(_) => StatusCode::NOT_FOUND,
            ImportError::TournamentCompleted | ImportError::DuplicateImport => StatusCode::CONFLICT,
            ImportError::Database(_) | ImportError::Audit(_) => return Self::internal(&error),
        };
        Self::new(status, error.client_message())
    }
}

impl From<StandingsError> for ApiError {
    fn from(error: StandingsError) -> Self {
        match &error {
            StandingsError::TournamentNotFound(_) => Self::not_found(error.to_string()),
            StandingsError::UnknownEvent(_) => Self::bad_request(error.to_string()),
            StandingsError::InvalidScore(_) | StandingsError::Database(_) => {
                Self::internal(&error)
            }
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(error: AuditError) -> Self {
        Self::internal(&error)
    }
}

impl From<RateLimitError> for ApiError {
    fn from(error: RateLimitError) -> Self {
        Self::internal(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_portal::tournament::TournamentState;

    #[test]
    fn test_auth_status_mapping() {
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::from(AuthError::EmailTaken).status, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(AuthError::EmptyUpdate).status,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_database_errors_are_sanitised() {
        let err = ApiError::from(ParticipantError::Database(sqlx::Error::RowNotFound));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, INTERNAL);

        let err = ApiError::from(ImportError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.message, INTERNAL);
    }

    #[test]
    fn test_conflicts() {
        let err = ApiError::from(TournamentError::InvalidTransition {
            from: TournamentState::Setup,
            to: TournamentState::Completed,
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(ImportError::DuplicateImport).status,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_participant_edit_refusals_are_forbidden() {
        let err = ApiError::from(ParticipantError::AdminOnlyFields(vec!["average"]));
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(err.message.contains("average"));
        assert_eq!(
            ApiError::from(ParticipantError::RegistrationClosed).status,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_full_doubles_pair_is_a_conflict() {
        let err = ApiError::from(ParticipantError::DoublesPairFull(4));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "Doubles pair 4 already has two participants");
    }

    #[test]
    fn test_retry_after_header() {
        let response = ApiError::rate_limited(Some(42)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
    }
}
