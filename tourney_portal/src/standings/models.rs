//! Standings data models.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Event a single game score belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreEvent {
    Singles,
    Doubles,
    Team,
}

impl ScoreEvent {
    pub const ALL: [ScoreEvent; 3] = [ScoreEvent::Singles, ScoreEvent::Doubles, ScoreEvent::Team];

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreEvent::Singles => "singles",
            ScoreEvent::Doubles => "doubles",
            ScoreEvent::Team => "team",
        }
    }
}

impl fmt::Display for ScoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Standings table to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Singles,
    Doubles,
    Team,
    /// Singles + doubles + team for bowlers who completed all nine games
    AllEvents,
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "singles" => Ok(Event::Singles),
            "doubles" => Ok(Event::Doubles),
            "team" => Ok(Event::Team),
            "all_events" | "all-events" | "all" => Ok(Event::AllEvents),
            other => Err(other.to_string()),
        }
    }
}

/// One bowled game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameScore {
    pub event: ScoreEvent,
    pub game: i16,
    pub score: i16,
}

/// A bowler with everything standings need
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BowlerScores {
    pub participant_id: i64,
    pub name: String,
    pub average: Option<i32>,
    pub did: Option<i64>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    pub games: Vec<GameScore>,
}

impl BowlerScores {
    pub fn scores_in(&self, event: ScoreEvent) -> impl Iterator<Item = i16> + '_ {
        self.games
            .iter()
            .filter(move |g| g.event == event)
            .map(|g| g.score)
    }
}

/// One ranked line of a standings table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingRow {
    /// Competition rank ("1224"); ties share a rank
    pub rank: u32,
    /// Bowler, pair or team name
    pub name: String,
    pub members: Vec<String>,
    pub games: u32,
    pub scratch: i32,
    pub handicap: i32,
    pub total: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_parsing() {
        assert_eq!("all-events".parse::<Event>(), Ok(Event::AllEvents));
        assert_eq!("all_events".parse::<Event>(), Ok(Event::AllEvents));
        assert_eq!("doubles".parse::<Event>(), Ok(Event::Doubles));
        assert!("baker".parse::<Event>().is_err());
        assert_eq!("team".parse::<ScoreEvent>(), Ok(ScoreEvent::Team));
        assert!("all".parse::<ScoreEvent>().is_err());
    }
}
