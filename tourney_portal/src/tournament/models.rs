//! Tournament data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Tournament ID type
pub type TournamentId = i64;

/// Tournament lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// Being configured, not visible to bowlers yet
    Setup,
    /// Accepting registrations and profile edits
    Open,
    /// Registration closed
    Closed,
    /// Bowling in progress
    Active,
    /// Finished, results final
    Completed,
}

impl TournamentState {
    pub const ALL: [TournamentState; 5] = [
        TournamentState::Setup,
        TournamentState::Open,
        TournamentState::Closed,
        TournamentState::Active,
        TournamentState::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TournamentState::Setup => "setup",
            TournamentState::Open => "open",
            TournamentState::Closed => "closed",
            TournamentState::Active => "active",
            TournamentState::Completed => "completed",
        }
    }

    /// Whether `self -> next` is a legal lifecycle step
    ///
    /// The lifecycle is linear except that a closed tournament may re-open
    /// registration.
    pub fn can_transition_to(self, next: TournamentState) -> bool {
        use TournamentState::*;
        matches!(
            (self, next),
            (Setup, Open) | (Open, Closed) | (Closed, Open) | (Closed, Active) | (Active, Completed)
        )
    }

    /// Participants may edit their own profile only while registration is open
    pub fn accepts_profile_edits(self) -> bool {
        self == TournamentState::Open
    }
}

impl fmt::Display for TournamentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Per-game handicap rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandicapRule {
    /// Average the handicap is measured against
    pub base: i32,
    /// Percentage of the difference awarded
    pub percent: i32,
    /// Cap per game
    pub max: i32,
}

impl HandicapRule {
    /// Handicap pins per game for a bowler with `average`
    ///
    /// `min(max, floor((base - average) * percent / 100))`, never negative.
    /// Bowlers without an average get no handicap.
    pub fn handicap_for(&self, average: Option<i32>) -> i32 {
        let Some(average) = average else {
            return 0;
        };

        let diff = i64::from(self.base) - i64::from(average);
        if diff <= 0 || self.percent <= 0 {
            return 0;
        }

        let pins = diff * i64::from(self.percent) / 100;
        pins.min(i64::from(self.max.max(0))) as i32
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0..=300).contains(&self.base) {
            return Err("Handicap base must be between 0 and 300".to_string());
        }
        if !(0..=100).contains(&self.percent) {
            return Err("Handicap percent must be between 0 and 100".to_string());
        }
        if !(0..=300).contains(&self.max) {
            return Err("Handicap max must be between 0 and 300".to_string());
        }
        Ok(())
    }
}

impl Default for HandicapRule {
    fn default() -> Self {
        Self {
            base: 220,
            percent: 80,
            max: 80,
        }
    }
}

/// Tournament record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    /// URL slug, unique across tournaments
    pub identifier: String,
    pub name: String,
    pub year: i32,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub entry_deadline: Option<DateTime<Utc>>,
    pub handicap: HandicapRule,
    pub state: TournamentState,
    pub created_at: DateTime<Utc>,
}

/// Tournament creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTournament {
    pub identifier: String,
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub entry_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub handicap: Option<HandicapRule>,
}

impl NewTournament {
    pub fn validate(&self) -> Result<(), String> {
        validate_identifier(&self.identifier)?;
        validate_name(&self.name)?;
        if !(1900..=2200).contains(&self.year) {
            return Err(format!("Year {} is out of range", self.year));
        }
        validate_dates(self.start_date, self.end_date)?;
        if let Some(handicap) = &self.handicap {
            handicap.validate()?;
        }
        Ok(())
    }
}

/// Partial tournament update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TournamentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    /// An empty string clears the location
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub entry_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub handicap: Option<HandicapRule>,
}

impl TournamentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.entry_deadline.is_none()
            && self.handicap.is_none()
    }

    /// Validate against the current record (dates are checked merged)
    pub fn validate(&self, current: &Tournament) -> Result<(), String> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_dates(
            self.start_date.or(current.start_date),
            self.end_date.or(current.end_date),
        )?;
        if let Some(handicap) = &self.handicap {
            handicap.validate()?;
        }
        Ok(())
    }
}

/// Body of a state transition request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: TournamentState,
}

/// Validate a tournament slug: 3-64 of `[a-z0-9-]`
pub fn validate_identifier(identifier: &str) -> Result<(), String> {
    if identifier.len() < 3 || identifier.len() > 64 {
        return Err("Identifier must be 3-64 characters".to_string());
    }
    if !identifier
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(
            "Identifier may contain only lowercase letters, digits and hyphens".to_string(),
        );
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() || name.len() > 200 {
        return Err("Name must be 1-200 characters".to_string());
    }
    Ok(())
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), String> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err("End date must not be before start date".to_string())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_legal_transitions() {
        use TournamentState::*;
        assert!(Setup.can_transition_to(Open));
        assert!(Open.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Open));
        assert!(Closed.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
    }

    #[test]
    fn test_illegal_transitions() {
        use TournamentState::*;
        assert!(!Setup.can_transition_to(Active));
        assert!(!Open.can_transition_to(Setup));
        assert!(!Active.can_transition_to(Open));
        assert!(!Completed.can_transition_to(Open));
        for state in TournamentState::ALL {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_state_round_trips_through_column_value() {
        for state in TournamentState::ALL {
            assert_eq!(state.as_str().parse::<TournamentState>(), Ok(state));
        }
        assert!("running".parse::<TournamentState>().is_err());
    }

    #[test]
    fn test_handicap_examples() {
        let rule = HandicapRule::default();
        assert_eq!(rule.handicap_for(Some(180)), 32); // (220-180)*0.8
        assert_eq!(rule.handicap_for(Some(175)), 36); // 36.0
        assert_eq!(rule.handicap_for(Some(177)), 34); // 34.4 floors
        assert_eq!(rule.handicap_for(Some(100)), 80); // capped
        assert_eq!(rule.handicap_for(Some(230)), 0); // above base
        assert_eq!(rule.handicap_for(None), 0);
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("spring-classic-2025").is_ok());
        assert!(validate_identifier("abc").is_ok());
        assert!(validate_identifier("ab").is_err());
        assert!(validate_identifier("Spring").is_err());
        assert!(validate_identifier("with space").is_err());
        assert!(validate_identifier(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_new_tournament_rejects_reversed_dates() {
        let new = NewTournament {
            identifier: "fall-open".to_string(),
            name: "Fall Open".to_string(),
            year: 2025,
            location: None,
            start_date: NaiveDate::from_ymd_opt(2025, 10, 5),
            end_date: NaiveDate::from_ymd_opt(2025, 10, 4),
            entry_deadline: None,
            handicap: None,
        };
        assert!(new.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_handicap_within_bounds(
            base in 0i32..=300,
            percent in 0i32..=100,
            max in 0i32..=300,
            average in 0i32..=300,
        ) {
            let rule = HandicapRule { base, percent, max };
            let pins = rule.handicap_for(Some(average));
            prop_assert!(pins >= 0);
            prop_assert!(pins <= max);
        }

        #[test]
        fn prop_handicap_non_increasing_in_average(
            average in 0i32..300,
            bump in 1i32..50,
        ) {
            let rule = HandicapRule::default();
            prop_assert!(rule.handicap_for(Some(average + bump)) <= rule.handicap_for(Some(average)));
        }
    }
}
