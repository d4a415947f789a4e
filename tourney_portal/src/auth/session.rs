//! Signed session tokens.
//!
//! Sessions are stateless HS256 JWTs. The HTTP layer carries them in an
//! `HttpOnly` cookie (or a bearer header for API clients).

use super::{
    errors::{AuthError, AuthResult},
    models::{AdminId, AdminRole, IssuedSession, Principal, SessionClaims, SessionKind},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct SessionSigner {
    secret: String,
    admin_session_duration: Duration,
    participant_session_duration: Duration,
}

impl SessionSigner {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            admin_session_duration: Duration::hours(12),
            participant_session_duration: Duration::days(30),
        }
    }

    pub fn admin_session_duration(&self) -> Duration {
        self.admin_session_duration
    }

    pub fn participant_session_duration(&self) -> Duration {
        self.participant_session_duration
    }

    pub fn issue_admin(&self, admin_id: AdminId, role: AdminRole) -> AuthResult<IssuedSession> {
        self.issue_admin_at(admin_id, role, Utc::now())
    }

    pub fn issue_participant(
        &self,
        participant_id: i64,
        tournament_id: i64,
    ) -> AuthResult<IssuedSession> {
        self.issue_participant_at(participant_id, tournament_id, Utc::now())
    }

    pub(crate) fn issue_admin_at(
        &self,
        admin_id: AdminId,
        role: AdminRole,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedSession> {
        let expires_at = now + self.admin_session_duration;
        self.sign(SessionClaims {
            sub: admin_id,
            kind: SessionKind::Admin,
            role: Some(role),
            tournament_id: None,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        })
    }

    pub(crate) fn issue_participant_at(
        &self,
        participant_id: i64,
        tournament_id: i64,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedSession> {
        let expires_at = now + self.participant_session_duration;
        self.sign(SessionClaims {
            sub: participant_id,
            kind: SessionKind::Participant,
            role: None,
            tournament_id: Some(tournament_id),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        })
    }

    fn sign(&self, claims: SessionClaims) -> AuthResult<IssuedSession> {
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(IssuedSession {
            token,
            kind: claims.kind,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        })
    }

    /// Decode a token into the caller it authenticates
    ///
    /// Expired, tampered and structurally inconsistent tokens are rejected.
    pub fn verify(&self, token: &str) -> AuthResult<Principal> {
        let claims = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?
        .claims;

        match (claims.kind, claims.role, claims.tournament_id) {
            (SessionKind::Admin, Some(role), _) => Ok(Principal::Admin {
                id: claims.sub,
                role,
            }),
            (SessionKind::Participant, None, Some(tournament_id)) => Ok(Principal::Participant {
                id: claims.sub,
                tournament_id,
            }),
            _ => Err(AuthError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::new("a-test-secret-that-is-long-enough-for-hs256".to_string())
    }

    #[test]
    fn test_admin_session_round_trip() {
        let signer = signer();
        let session = signer.issue_admin(7, AdminRole::TournamentAdmin).unwrap();
        assert_eq!(session.kind, SessionKind::Admin);

        let principal = signer.verify(&session.token).unwrap();
        assert_eq!(
            principal,
            Principal::Admin {
                id: 7,
                role: AdminRole::TournamentAdmin
            }
        );
    }

    #[test]
    fn test_participant_session_round_trip() {
        let signer = signer();
        let session = signer.issue_participant(42, 3).unwrap();
        let principal = signer.verify(&session.token).unwrap();
        assert_eq!(
            principal,
            Principal::Participant {
                id: 42,
                tournament_id: 3
            }
        );
    }

    #[test]
    fn test_expired_session_rejected() {
        let signer = signer();
        let issued_long_ago = Utc::now() - Duration::days(2);
        let session = signer
            .issue_admin_at(1, AdminRole::SuperAdmin, issued_long_ago)
            .unwrap();
        assert!(matches!(
            signer.verify(&session.token),
            Err(AuthError::JwtError(_))
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let session = signer().issue_admin(1, AdminRole::SuperAdmin).unwrap();
        let other = SessionSigner::new("a-completely-different-secret-value!!".to_string());
        assert!(other.verify(&session.token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(signer().verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_participant_session_outlives_admin_session() {
        let signer = signer();
        assert!(signer.participant_session_duration() > signer.admin_session_duration());
    }
}
