//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    models::{
        Admin, AdminId, AdminRole, AdminUpdate, IssuedSession, NewAdmin, ParticipantLogin,
        Principal,
    },
    session::SessionSigner,
};
use crate::{
    audit::{AuditAction, AuditLog, NewAuditEntry},
    db::unique_violation,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;

const ADMIN_COLUMNS: &str = "id, email, name, role, is_active, created_at, last_login";

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    pool: Arc<PgPool>,
    pepper: String,
    signer: SessionSigner,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `pepper` - Server-side pepper for password hashing
    /// * `session_secret` - Secret key for session token signing
    pub fn new(pool: Arc<PgPool>, pepper: String, session_secret: String) -> Self {
        Self {
            pool,
            pepper,
            signer: SessionSigner::new(session_secret),
        }
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    /// Create an admin account
    ///
    /// `by` is `None` only when bootstrapping the first super admin from the CLI.
    ///
    /// # Errors
    ///
    /// * `AuthError::Forbidden` - `by` is not a super admin
    /// * `AuthError::EmailTaken` - Email already exists
    /// * `AuthError::InvalidEmail` / `AuthError::WeakPassword` - Validation failed
    pub async fn create_admin(&self, by: Option<&Principal>, request: NewAdmin) -> AuthResult<Admin> {
        if let Some(by) = by {
            by.require_super_admin()?;
        }

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;
        let name = request.name.trim();
        if name.is_empty() || name.len() > 100 {
            return Err(AuthError::InvalidName(
                "Name must be 1-100 characters".to_string(),
            ));
        }

        let password_hash = self.hash_password(&request.password)?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM admins WHERE email = $1")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let row = sqlx::query(&format!(
            "INSERT INTO admins (email, password_hash, name, role) VALUES ($1, $2, $3, $4) RETURNING {ADMIN_COLUMNS}"
        ))
        .bind(&email)
        .bind(&password_hash)
        .bind(name)
        .bind(request.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(email_conflict)?;
        let admin = admin_from_row(&row)?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::AdminCreated)
                .with_admin(by.and_then(Principal::admin_id))
                .with_details(serde_json::json!({
                    "admin_id": admin.id,
                    "email": admin.email,
                    "role": admin.role,
                })),
        )
        .await?;

        tx.commit().await?;
        log::info!("Created {} account {}", admin.role, admin.email);
        Ok(admin)
    }

    /// Log an admin in with email and password
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password
    /// * `AuthError::AccountDisabled` - Account deactivated
    pub async fn login_admin(&self, email: &str, password: &str) -> AuthResult<(Admin, IssuedSession)> {
        let email = normalize_email(email);
        let row = sqlx::query(&format!(
            "SELECT {ADMIN_COLUMNS}, password_hash FROM admins WHERE email = $1"
        ))
        .bind(&email)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        let password_hash: String = row.get("password_hash");
        self.verify_password(password, &password_hash)?;

        let admin = admin_from_row(&row)?;
        if !admin.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE admins SET last_login = NOW() WHERE id = $1")
            .bind(admin.id)
            .execute(&mut *tx)
            .await?;
        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::AdminLogin).with_admin(Some(admin.id)),
        )
        .await?;
        tx.commit().await?;

        let session = self.signer.issue_admin(admin.id, admin.role)?;
        Ok((admin, session))
    }

    /// Passwordless participant login from a portal link
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidLoginLink` - The identifier is malformed or unknown
    pub async fn login_participant(&self, identifier: &str) -> AuthResult<ParticipantLogin> {
        if !crate::participant::is_valid_identifier(identifier) {
            return Err(AuthError::InvalidLoginLink);
        }

        let row = sqlx::query("SELECT id, tournament_id FROM participants WHERE identifier = $1")
            .bind(identifier)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(AuthError::InvalidLoginLink)?;

        let participant_id: i64 = row.get("id");
        let tournament_id: i64 = row.get("tournament_id");

        AuditLog::record(
            self.pool.as_ref(),
            &NewAuditEntry::new(AuditAction::ParticipantLogin)
                .with_tournament(tournament_id)
                .with_participant(participant_id),
        )
        .await?;

        let session = self.signer.issue_participant(participant_id, tournament_id)?;
        Ok(ParticipantLogin {
            participant_id,
            tournament_id,
            session,
        })
    }

    /// Verify a session token
    ///
    /// Admin sessions are additionally checked against the account's current
    /// state so that deactivating an admin ends their sessions.
    pub async fn verify_session(&self, token: &str) -> AuthResult<Principal> {
        let principal = self.signer.verify(token)?;

        if let Principal::Admin { id, .. } = principal {
            let row = sqlx::query("SELECT role, is_active FROM admins WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?
                .ok_or(AuthError::Unauthenticated)?;
            if !row.get::<bool, _>("is_active") {
                return Err(AuthError::AccountDisabled);
            }
            let role = parse_role(&row)?;
            return Ok(Principal::Admin { id, role });
        }

        Ok(principal)
    }

    pub async fn get_admin(&self, admin_id: AdminId) -> AuthResult<Admin> {
        let row = sqlx::query(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1"))
            .bind(admin_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(AuthError::AdminNotFound(admin_id))?;
        admin_from_row(&row)
    }

    pub async fn list_admins(&self) -> AuthResult<Vec<Admin>> {
        let rows = sqlx::query(&format!("SELECT {ADMIN_COLUMNS} FROM admins ORDER BY email"))
            .fetch_all(self.pool.as_ref())
            .await?;
        rows.iter().map(admin_from_row).collect()
    }

    /// Apply a password and/or active-flag change in one transaction
    /// (super admin only)
    ///
    /// Everything is validated before anything is written, so a rejected
    /// request leaves the account untouched.
    ///
    /// # Errors
    ///
    /// * `AuthError::EmptyUpdate` - Neither field present
    /// * `AuthError::Forbidden` - Not a super admin, or deactivating oneself
    /// * `AuthError::WeakPassword` - New password fails the strength rules
    /// * `AuthError::AdminNotFound` - No such admin
    pub async fn update_admin(
        &self,
        by: &Principal,
        admin_id: AdminId,
        update: &AdminUpdate,
    ) -> AuthResult<Admin> {
        let acting = by.require_super_admin()?;
        if update.is_empty() {
            return Err(AuthError::EmptyUpdate);
        }
        if acting == admin_id && update.is_active == Some(false) {
            return Err(AuthError::Forbidden);
        }
        if let Some(password) = &update.password {
            validate_password(password)?;
        }

        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT id FROM admins WHERE id = $1 FOR UPDATE")
            .bind(admin_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(AuthError::AdminNotFound(admin_id));
        }

        let password_hash = match &update.password {
            Some(password) => Some(self.hash_password(password)?),
            None => None,
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE admins SET
                password_hash = COALESCE($1, password_hash),
                is_active = COALESCE($2, is_active)
            WHERE id = $3
            RETURNING {ADMIN_COLUMNS}
            "#
        ))
        .bind(password_hash)
        .bind(update.is_active)
        .bind(admin_id)
        .fetch_one(&mut *tx)
        .await?;
        let admin = admin_from_row(&row)?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::AdminUpdated)
                .with_admin(Some(acting))
                .with_details(serde_json::json!({
                    "admin_id": admin_id,
                    "password_changed": update.password.is_some(),
                    "is_active": update.is_active,
                })),
        )
        .await?;

        tx.commit().await?;
        Ok(admin)
    }

    /// Replace an admin's password (super admin only)
    pub async fn set_admin_password(
        &self,
        by: &Principal,
        admin_id: AdminId,
        password: &str,
    ) -> AuthResult<Admin> {
        let update = AdminUpdate {
            password: Some(password.to_string()),
            is_active: None,
        };
        self.update_admin(by, admin_id, &update).await
    }

    /// Activate or deactivate an admin (super admin only; not oneself)
    pub async fn set_admin_active(
        &self,
        by: &Principal,
        admin_id: AdminId,
        is_active: bool,
    ) -> AuthResult<Admin> {
        let update = AdminUpdate {
            password: None,
            is_active: Some(is_active),
        };
        self.update_admin(by, admin_id, &update).await
    }

    /// Give a tournament admin access to a tournament (super admin only)
    pub async fn assign_tournament(
        &self,
        by: &Principal,
        admin_id: AdminId,
        tournament_id: i64,
    ) -> AuthResult<()> {
        let acting = by.require_super_admin()?;
        let mut tx = self.pool.begin().await?;

        let admin_exists = sqlx::query("SELECT 1 FROM admins WHERE id = $1")
            .bind(admin_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !admin_exists {
            return Err(AuthError::AdminNotFound(admin_id));
        }
        let tournament_exists = sqlx::query("SELECT 1 FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !tournament_exists {
            return Err(AuthError::TournamentNotFound(tournament_id));
        }

        sqlx::query(
            "INSERT INTO admin_tournaments (admin_id, tournament_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(admin_id)
        .bind(tournament_id)
        .execute(&mut *tx)
        .await?;

        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::AdminAssigned)
                .with_admin(Some(acting))
                .with_tournament(tournament_id)
                .with_details(serde_json::json!({ "admin_id": admin_id })),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn unassign_tournament(
        &self,
        by: &Principal,
        admin_id: AdminId,
        tournament_id: i64,
    ) -> AuthResult<()> {
        let acting = by.require_super_admin()?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM admin_tournaments WHERE admin_id = $1 AND tournament_id = $2")
            .bind(admin_id)
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;
        AuditLog::record(
            &mut *tx,
            &NewAuditEntry::new(AuditAction::AdminUnassigned)
                .with_admin(Some(acting))
                .with_tournament(tournament_id)
                .with_details(serde_json::json!({ "admin_id": admin_id })),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Tournaments a tournament admin is assigned to
    pub async fn admin_tournaments(&self, admin_id: AdminId) -> AuthResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT tournament_id FROM admin_tournaments WHERE admin_id = $1 ORDER BY tournament_id",
        )
        .bind(admin_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.iter().map(|row| row.get("tournament_id")).collect())
    }

    /// Database-backed form of [`Principal::can_manage_tournament`]
    pub async fn ensure_can_manage(&self, principal: &Principal, tournament_id: i64) -> AuthResult<()> {
        let assigned = match principal {
            Principal::Admin {
                id,
                role: AdminRole::TournamentAdmin,
            } => self.admin_tournaments(*id).await?,
            _ => Vec::new(),
        };

        if principal.can_manage_tournament(tournament_id, &assigned) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// Hash password with Argon2id + pepper
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(Argon2::default()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

/// A lost race on `admins.email` is the same conflict the pre-check reports
fn email_conflict(err: sqlx::Error) -> AuthError {
    match unique_violation(&err) {
        Some("admins_email_key") => AuthError::EmailTaken,
        _ => AuthError::Database(err),
    }
}

fn parse_role(row: &PgRow) -> AuthResult<AdminRole> {
    let role: String = row.get("role");
    role.parse()
        .map_err(|role| AuthError::Database(sqlx::Error::Decode(format!("unknown admin role {role:?}").into())))
}

fn admin_from_row(row: &PgRow) -> AuthResult<Admin> {
    Ok(Admin {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        role: parse_role(row)?,
        is_active: row.get("is_active"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        last_login: row
            .get::<Option<chrono::NaiveDateTime>, _>("last_login")
            .map(|dt| dt.and_utc()),
    })
}

/// Lowercase and trim an email for storage and comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate email format
///
/// Deliberately loose: one `@`, a non-empty local part, a dotted domain and
/// no whitespace.
pub fn validate_email(email: &str) -> AuthResult<()> {
    if email.is_empty() || email.len() > 254 {
        return Err(AuthError::InvalidEmail(
            "Email must be 1-254 characters".to_string(),
        ));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidEmail(
            "Email cannot contain whitespace".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail("Email must contain @".to_string()));
    };
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if local.is_empty() || !domain_ok {
        return Err(AuthError::InvalidEmail(format!("{email:?} is not an email address")));
    }

    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.len() < 8 {
        return Err(AuthError::WeakPassword(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());

    if !has_digit || !has_uppercase || !has_lowercase {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one number, one uppercase and one lowercase letter"
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Ann.Lee@Example.COM "), "ann.lee@example.com");
    }

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("bowler@example.com").is_ok());
        assert!(validate_email("a+b@sub.example.org").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        for email in ["", "no-at-sign", "@example.com", "a@b", "a@.com", "a@b.", "a b@c.com", "a@b@c.com"] {
            assert!(
                matches!(validate_email(email), Err(AuthError::InvalidEmail(_))),
                "{email:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password("Short1").is_err());
        assert!(validate_password("alllowercase123").is_err());
        assert!(validate_password("NoDigitsHereAtAll").is_err());
        assert!(validate_password("Strikes4AndSpares").is_ok());
    }
}
