//! Audit log data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AdminLogin,
    ParticipantLogin,
    AdminCreated,
    AdminUpdated,
    AdminAssigned,
    AdminUnassigned,
    TournamentCreated,
    TournamentUpdated,
    TournamentTransitioned,
    TournamentDeleted,
    ParticipantCreated,
    ParticipantUpdated,
    ParticipantDeleted,
    IdentifierRegenerated,
    DoublesPaired,
    DoublesUnpaired,
    TeamCreated,
    TeamAssigned,
    ImportApplied,
}

impl AuditAction {
    pub const ALL: [AuditAction; 19] = [
        AuditAction::AdminLogin,
        AuditAction::ParticipantLogin,
        AuditAction::AdminCreated,
        AuditAction::AdminUpdated,
        AuditAction::AdminAssigned,
        AuditAction::AdminUnassigned,
        AuditAction::TournamentCreated,
        AuditAction::TournamentUpdated,
        AuditAction::TournamentTransitioned,
        AuditAction::TournamentDeleted,
        AuditAction::ParticipantCreated,
        AuditAction::ParticipantUpdated,
        AuditAction::ParticipantDeleted,
        AuditAction::IdentifierRegenerated,
        AuditAction::DoublesPaired,
        AuditAction::DoublesUnpaired,
        AuditAction::TeamCreated,
        AuditAction::TeamAssigned,
        AuditAction::ImportApplied,
    ];

    /// Column value stored in `audit_entries.action`
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::AdminLogin => "admin_login",
            AuditAction::ParticipantLogin => "participant_login",
            AuditAction::AdminCreated => "admin_created",
            AuditAction::AdminUpdated => "admin_updated",
            AuditAction::AdminAssigned => "admin_assigned",
            AuditAction::AdminUnassigned => "admin_unassigned",
            AuditAction::TournamentCreated => "tournament_created",
            AuditAction::TournamentUpdated => "tournament_updated",
            AuditAction::TournamentTransitioned => "tournament_transitioned",
            AuditAction::TournamentDeleted => "tournament_deleted",
            AuditAction::ParticipantCreated => "participant_created",
            AuditAction::ParticipantUpdated => "participant_updated",
            AuditAction::ParticipantDeleted => "participant_deleted",
            AuditAction::IdentifierRegenerated => "identifier_regenerated",
            AuditAction::DoublesPaired => "doubles_paired",
            AuditAction::DoublesUnpaired => "doubles_unpaired",
            AuditAction::TeamCreated => "team_created",
            AuditAction::TeamAssigned => "team_assigned",
            AuditAction::ImportApplied => "import_applied",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Stored audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub tournament_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub participant_id: Option<i64>,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Entry to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub tournament_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub participant_id: Option<i64>,
    pub action: AuditAction,
    pub details: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            tournament_id: None,
            admin_id: None,
            participant_id: None,
            action,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_tournament(mut self, tournament_id: i64) -> Self {
        self.tournament_id = Some(tournament_id);
        self
    }

    /// `None` leaves the entry without an acting admin (participant self-service)
    pub fn with_admin(mut self, admin_id: Option<i64>) -> Self {
        self.admin_id = admin_id;
        self
    }

    pub fn with_participant(mut self, participant_id: i64) -> Self {
        self.participant_id = Some(participant_id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Listing filter; all criteria are ANDed
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditFilter {
    pub tournament_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub participant_id: Option<i64>,
    pub action: Option<AuditAction>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditFilter {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    pub fn for_tournament(tournament_id: i64) -> Self {
        Self {
            tournament_id: Some(tournament_id),
            ..Self::default()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_through_column_value() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }
        assert!("made_up".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_action_serde_matches_column_value() {
        let json = serde_json::to_string(&AuditAction::DoublesPaired).unwrap();
        assert_eq!(json, "\"doubles_paired\"");
    }

    #[test]
    fn test_builder_sets_fields() {
        let entry = NewAuditEntry::new(AuditAction::ParticipantUpdated)
            .with_tournament(3)
            .with_admin(Some(9))
            .with_participant(42)
            .with_details(serde_json::json!({"fields": ["email"]}));

        assert_eq!(entry.tournament_id, Some(3));
        assert_eq!(entry.admin_id, Some(9));
        assert_eq!(entry.participant_id, Some(42));
        assert_eq!(entry.details["fields"][0], "email");
    }

    #[test]
    fn test_filter_limits_are_clamped() {
        let mut filter = AuditFilter::default();
        assert_eq!(filter.effective_limit(), AuditFilter::DEFAULT_LIMIT);

        filter.limit = Some(50_000);
        assert_eq!(filter.effective_limit(), AuditFilter::MAX_LIMIT);

        filter.limit = Some(0);
        filter.offset = Some(-5);
        assert_eq!(filter.effective_limit(), 1);
        assert_eq!(filter.effective_offset(), 0);
    }
}
