//! Import data models.

use crate::standings::ScoreEvent;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of file, recorded with each applied batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Registrations,
    Scores,
}

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::Registrations => "registrations",
            ImportKind::Scores => "scores",
        }
    }
}

/// Score file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreFormat {
    #[default]
    Csv,
    Xml,
}

impl FromStr for ScoreFormat {
    type Err = super::ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ScoreFormat::Csv),
            "xml" => Ok(ScoreFormat::Xml),
            other => Err(super::ImportError::UnknownFormat(other.to_string())),
        }
    }
}

/// A row that was skipped, with its 1-based line number in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

impl RowError {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Outcome of an applied import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Participants created
    pub created: u32,
    /// Participants updated
    pub updated: u32,
    /// Scores written
    pub scores: u32,
    pub skipped: Vec<RowError>,
}

/// One parsed registration row; `None` fields leave stored values alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationRow {
    pub line: u64,
    pub first_name: String,
    pub last_name: String,
    pub pid: Option<i64>,
    pub did: Option<i64>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub usbc_id: Option<String>,
    pub average: Option<i32>,
    pub team: Option<String>,
}

/// One parsed game score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRow {
    pub line: u64,
    pub pid: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub event: ScoreEvent,
    pub game: i16,
    pub score: i16,
}
