//! Participant data models.

use chrono::{DateTime, NaiveDate, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

/// Participant ID type
pub type ParticipantId = i64;

/// Length of the portal login identifier
pub const IDENTIFIER_LEN: usize = 16;

/// A registered bowler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub tournament_id: i64,
    /// Legacy participant number
    pub pid: Option<i64>,
    /// Legacy doubles-pair number, shared by both partners
    pub did: Option<i64>,
    pub team_id: Option<i64>,
    /// Secret part of the portal login link
    pub identifier: String,
    pub first_name: String,
    pub last_name: String,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub usbc_id: Option<String>,
    pub average: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Participant {
    /// Display name, preferring the nickname over the first name
    pub fn display_name(&self) -> String {
        let first = self
            .nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.first_name);
        format!("{} {}", first, self.last_name)
    }
}

/// Team entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub tournament_id: i64,
    pub name: String,
    /// Team number carried over from imported files
    pub legacy_tid: Option<i64>,
}

/// Participant creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewParticipant {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub pid: Option<i64>,
    #[serde(default)]
    pub did: Option<i64>,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub usbc_id: Option<String>,
    #[serde(default)]
    pub average: Option<i32>,
}

impl NewParticipant {
    pub fn validate(&self) -> Result<(), String> {
        validate_name("First name", &self.first_name)?;
        validate_name("Last name", &self.last_name)?;
        validate_email(self.email.as_deref())?;
        validate_average(self.average)?;
        validate_text_lengths([
            ("Nickname", self.nickname.as_deref()),
            ("Phone", self.phone.as_deref()),
            ("City", self.city.as_deref()),
            ("State", self.state.as_deref()),
            ("Country", self.country.as_deref()),
            ("USBC ID", self.usbc_id.as_deref()),
        ])
    }
}

/// Partial profile update
///
/// An absent field is left untouched. For text fields an empty string clears
/// the stored value; the numeric and date fields are cleared with `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    // Contact fields, editable by the participant while registration is open
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,

    // Admin only
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub usbc_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub birth_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub average: Option<Option<i32>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub pid: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub did: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub team_id: Option<Option<i64>>,
}

impl ProfileUpdate {
    /// Names of the admin-only fields present in this update
    pub fn admin_only_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.first_name.is_some() {
            fields.push("first_name");
        }
        if self.last_name.is_some() {
            fields.push("last_name");
        }
        if self.birth_date.is_some() {
            fields.push("birth_date");
        }
        if self.usbc_id.is_some() {
            fields.push("usbc_id");
        }
        if self.average.is_some() {
            fields.push("average");
        }
        if self.pid.is_some() {
            fields.push("pid");
        }
        if self.did.is_some() {
            fields.push("did");
        }
        if self.team_id.is_some() {
            fields.push("team_id");
        }
        fields
    }

    /// Names of every field present in this update
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        for (name, present) in [
            ("nickname", self.nickname.is_some()),
            ("email", self.email.is_some()),
            ("phone", self.phone.is_some()),
            ("city", self.city.is_some()),
            ("state", self.state.is_some()),
            ("country", self.country.is_some()),
        ] {
            if present {
                fields.push(name);
            }
        }
        fields.extend(self.admin_only_fields());
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(first_name) = &self.first_name {
            validate_name("First name", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            validate_name("Last name", last_name)?;
        }
        validate_email(self.email.as_deref())?;
        validate_average(self.average.flatten())?;
        validate_text_lengths([
            ("Nickname", self.nickname.as_deref()),
            ("Phone", self.phone.as_deref()),
            ("City", self.city.as_deref()),
            ("State", self.state.as_deref()),
            ("Country", self.country.as_deref()),
            ("USBC ID", self.usbc_id.as_deref()),
        ])
    }
}

/// Sort column for participant search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantSort {
    #[default]
    LastName,
    FirstName,
    Pid,
    CreatedAt,
}

impl ParticipantSort {
    /// SQL ordering expression; never built from user input
    pub(crate) fn order_by(self, descending: bool) -> &'static str {
        match (self, descending) {
            (ParticipantSort::LastName, false) => "last_name ASC, first_name ASC, id ASC",
            (ParticipantSort::LastName, true) => "last_name DESC, first_name DESC, id DESC",
            (ParticipantSort::FirstName, false) => "first_name ASC, last_name ASC, id ASC",
            (ParticipantSort::FirstName, true) => "first_name DESC, last_name DESC, id DESC",
            (ParticipantSort::Pid, false) => "pid ASC NULLS LAST, id ASC",
            (ParticipantSort::Pid, true) => "pid DESC NULLS LAST, id DESC",
            (ParticipantSort::CreatedAt, false) => "created_at ASC, id ASC",
            (ParticipantSort::CreatedAt, true) => "created_at DESC, id DESC",
        }
    }
}

/// Participant search filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantFilter {
    #[serde(default)]
    pub tournament_id: i64,
    /// Case-insensitive substring of first, last or nick name
    #[serde(default)]
    pub name: Option<String>,
    /// Case-insensitive substring of the email address
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub has_partner: Option<bool>,
    #[serde(default)]
    pub missing_average: bool,
    #[serde(default)]
    pub sort: ParticipantSort,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl ParticipantFilter {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 500;

    pub fn for_tournament(tournament_id: i64) -> Self {
        Self {
            tournament_id,
            ..Default::default()
        }
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Generate a fresh portal login identifier
pub fn generate_identifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(IDENTIFIER_LEN)
        .map(char::from)
        .collect()
}

/// Whether `identifier` has the shape of a portal login identifier
pub fn is_valid_identifier(identifier: &str) -> bool {
    identifier.len() == IDENTIFIER_LEN && identifier.chars().all(|c| c.is_ascii_alphanumeric())
}

fn validate_name(label: &str, name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(format!("{label} must be 1-100 characters"));
    }
    Ok(())
}

fn validate_email(email: Option<&str>) -> Result<(), String> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => crate::auth::validate_email(&email.to_lowercase()).map_err(|e| e.to_string()),
        None => Ok(()),
    }
}

fn validate_average(average: Option<i32>) -> Result<(), String> {
    match average {
        Some(avg) if !(0..=300).contains(&avg) => {
            Err(format!("Average {avg} must be between 0 and 300"))
        }
        _ => Ok(()),
    }
}

fn validate_text_lengths<const N: usize>(fields: [(&str, Option<&str>); N]) -> Result<(), String> {
    for (label, value) in fields {
        if value.is_some_and(|v| v.len() > 200) {
            return Err(format!("{label} is too long"));
        }
    }
    Ok(())
}
