//! Authorization checks on an authenticated [`Principal`].
//!
//! These are pure; callers supply the tournaments a tournament admin is
//! assigned to (see [`AuthManager::ensure_can_manage`](super::AuthManager::ensure_can_manage)
//! for the database-backed variant).

use super::{
    errors::{AuthError, AuthResult},
    models::{AdminId, AdminRole, Principal},
};

impl Principal {
    /// Acting admin, if any
    pub fn admin_id(&self) -> Option<AdminId> {
        match self {
            Principal::Admin { id, .. } => Some(*id),
            Principal::Participant { .. } => None,
        }
    }

    /// Acting participant, if any
    pub fn participant_id(&self) -> Option<i64> {
        match self {
            Principal::Participant { id, .. } => Some(*id),
            Principal::Admin { .. } => None,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(
            self,
            Principal::Admin {
                role: AdminRole::SuperAdmin,
                ..
            }
        )
    }

    /// Any admin role
    pub fn require_admin(&self) -> AuthResult<(AdminId, AdminRole)> {
        match self {
            Principal::Admin { id, role } => Ok((*id, *role)),
            Principal::Participant { .. } => Err(AuthError::Forbidden),
        }
    }

    pub fn require_super_admin(&self) -> AuthResult<AdminId> {
        match self {
            Principal::Admin {
                id,
                role: AdminRole::SuperAdmin,
            } => Ok(*id),
            _ => Err(AuthError::Forbidden),
        }
    }

    /// Super admins manage everything, tournament admins only `assigned`
    pub fn can_manage_tournament(&self, tournament_id: i64, assigned: &[i64]) -> bool {
        match self {
            Principal::Admin {
                role: AdminRole::SuperAdmin,
                ..
            } => true,
            Principal::Admin {
                role: AdminRole::TournamentAdmin,
                ..
            } => assigned.contains(&tournament_id),
            Principal::Participant { .. } => false,
        }
    }

    /// Participants edit only themselves; admins follow the tournament rule
    pub fn can_edit_participant(
        &self,
        participant_id: i64,
        participant_tournament_id: i64,
        assigned: &[i64],
    ) -> bool {
        match self {
            Principal::Participant { id, tournament_id } => {
                *id == participant_id && *tournament_id == participant_tournament_id
            }
            Principal::Admin { .. } => {
                self.can_manage_tournament(participant_tournament_id, assigned)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUPER: Principal = Principal::Admin {
        id: 1,
        role: AdminRole::SuperAdmin,
    };
    const TA: Principal = Principal::Admin {
        id: 2,
        role: AdminRole::TournamentAdmin,
    };
    const BOWLER: Principal = Principal::Participant {
        id: 77,
        tournament_id: 5,
    };

    #[test]
    fn test_super_admin_manages_everything() {
        assert!(SUPER.can_manage_tournament(5, &[]));
        assert!(SUPER.can_edit_participant(1, 99, &[]));
        assert_eq!(SUPER.require_super_admin().unwrap(), 1);
    }

    #[test]
    fn test_tournament_admin_limited_to_assignments() {
        assert!(TA.can_manage_tournament(5, &[5, 6]));
        assert!(!TA.can_manage_tournament(7, &[5, 6]));
        assert!(TA.can_edit_participant(10, 6, &[5, 6]));
        assert!(!TA.can_edit_participant(10, 8, &[5, 6]));
        assert!(matches!(TA.require_super_admin(), Err(AuthError::Forbidden)));
        assert!(TA.require_admin().is_ok());
    }

    #[test]
    fn test_participant_edits_only_self() {
        assert!(BOWLER.can_edit_participant(77, 5, &[]));
        assert!(!BOWLER.can_edit_participant(78, 5, &[]));
        // Same id in another tournament is a different record
        assert!(!BOWLER.can_edit_participant(77, 6, &[]));
        assert!(!BOWLER.can_manage_tournament(5, &[5]));
        assert!(matches!(BOWLER.require_admin(), Err(AuthError::Forbidden)));
    }

    #[test]
    fn test_ids() {
        assert_eq!(SUPER.admin_id(), Some(1));
        assert_eq!(SUPER.participant_id(), None);
        assert_eq!(BOWLER.admin_id(), None);
        assert_eq!(BOWLER.participant_id(), Some(77));
    }
}
