//! Authentication data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Admin ID type
pub type AdminId = i64;

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Manages every tournament and every admin account
    SuperAdmin,
    /// Manages only the tournaments it is assigned to
    TournamentAdmin,
}

impl AdminRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "super_admin",
            AdminRole::TournamentAdmin => "tournament_admin",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(AdminRole::SuperAdmin),
            "tournament_admin" => Ok(AdminRole::TournamentAdmin),
            other => Err(other.to_string()),
        }
    }
}

/// Admin model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: AdminId,
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Admin creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: AdminRole,
}

/// Password and/or active-flag change for an admin account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminUpdate {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl AdminUpdate {
    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.is_active.is_none()
    }
}

/// Which cookie/session family a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Admin,
    Participant,
}

/// JWT claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Admin ID or participant ID, depending on `kind`
    pub sub: i64,
    pub kind: SessionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AdminRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
}

/// A freshly issued session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub token: String,
    pub kind: SessionKind,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Admin { id: AdminId, role: AdminRole },
    Participant { id: i64, tournament_id: i64 },
}

/// Result of a passwordless portal login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantLogin {
    pub participant_id: i64,
    pub tournament_id: i64,
    pub session: IssuedSession,
}
