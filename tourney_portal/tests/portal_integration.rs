//! Integration tests for admin/participant authentication, tournaments and
//! participant records.

mod common;

use common::{PEPPER, SESSION_SECRET, SUPER_ADMIN, create_tournament, setup_test_db, unique};
use tourney_portal::{
    audit::{AuditAction, AuditFilter, AuditLog},
    auth::{AdminRole, AdminUpdate, AuthError, AuthManager, NewAdmin, Principal},
    import::ImportManager,
    participant::{
        NewParticipant, ParticipantError, ParticipantFilter, ParticipantManager, ProfileUpdate,
    },
    tournament::{NewTournament, TournamentError, TournamentManager, TournamentState},
};
use tokio::task::JoinSet;

fn new_participant(first: &str, last: &str) -> NewParticipant {
    NewParticipant {
        first_name: first.to_string(),
        last_name: last.to_string(),
        ..Default::default()
    }
}

fn new_admin(email: &str, role: AdminRole) -> NewAdmin {
    NewAdmin {
        email: email.to_string(),
        password: "Strikes4AndSpares".to_string(),
        name: "Director".to_string(),
        role,
    }
}

#[tokio::test]
async fn test_admin_login_and_session() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let auth = AuthManager::new(pool, PEPPER.to_string(), SESSION_SECRET.to_string());
    let email = format!("{}@example.com", unique("admin"));

    let admin = auth
        .create_admin(
            None,
            NewAdmin {
                email: email.to_uppercase(),
                password: "Strikes4AndSpares".to_string(),
                name: "Director".to_string(),
                role: AdminRole::TournamentAdmin,
            },
        )
        .await
        .expect("Admin creation should succeed");
    assert_eq!(admin.email, email, "Email should be stored lowercase");

    let duplicate = auth
        .create_admin(
            None,
            NewAdmin {
                email: email.clone(),
                password: "Strikes4AndSpares".to_string(),
                name: "Again".to_string(),
                role: AdminRole::TournamentAdmin,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(AuthError::EmailTaken)));

    let wrong = auth.login_admin(&email, "WrongPassword1").await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    let (logged_in, session) = auth
        .login_admin(&email, "Strikes4AndSpares")
        .await
        .expect("Login should succeed");
    assert_eq!(logged_in.id, admin.id);

    let principal = auth.verify_session(&session.token).await.unwrap();
    assert_eq!(
        principal,
        Principal::Admin {
            id: admin.id,
            role: AdminRole::TournamentAdmin
        }
    );

    let acting = Principal::Admin {
        id: -1,
        role: AdminRole::SuperAdmin,
    };
    auth.set_admin_active(&acting, admin.id, false).await.unwrap();
    assert!(matches!(
        auth.verify_session(&session.token).await,
        Err(AuthError::AccountDisabled)
    ));
    assert!(matches!(
        auth.login_admin(&email, "Strikes4AndSpares").await,
        Err(AuthError::AccountDisabled)
    ));
}

#[tokio::test]
async fn test_tournament_admin_assignment() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let auth = AuthManager::new(pool.clone(), PEPPER.to_string(), SESSION_SECRET.to_string());
    let tournament = create_tournament(&pool, TournamentState::Setup).await;

    let admin = auth
        .create_admin(
            Some(&SUPER_ADMIN),
            NewAdmin {
                email: format!("{}@example.com", unique("ta")),
                password: "Strikes4AndSpares".to_string(),
                name: "Assistant".to_string(),
                role: AdminRole::TournamentAdmin,
            },
        )
        .await
        .unwrap();
    let principal = Principal::Admin {
        id: admin.id,
        role: admin.role,
    };

    assert!(matches!(
        auth.ensure_can_manage(&principal, tournament.id).await,
        Err(AuthError::Forbidden)
    ));

    auth.assign_tournament(&SUPER_ADMIN, admin.id, tournament.id)
        .await
        .unwrap();
    assert_eq!(auth.admin_tournaments(admin.id).await.unwrap(), vec![tournament.id]);
    auth.ensure_can_manage(&principal, tournament.id).await.unwrap();

    // Tournament admins cannot hand out assignments
    assert!(matches!(
        auth.assign_tournament(&principal, admin.id, tournament.id).await,
        Err(AuthError::Forbidden)
    ));

    auth.unassign_tournament(&SUPER_ADMIN, admin.id, tournament.id)
        .await
        .unwrap();
    assert!(auth.admin_tournaments(admin.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tournament_lifecycle() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let tournaments = TournamentManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Setup).await;

    let skip = tournaments
        .transition(None, tournament.id, TournamentState::Active)
        .await;
    assert!(matches!(skip, Err(TournamentError::InvalidTransition { .. })));

    let open = tournaments
        .transition(None, tournament.id, TournamentState::Open)
        .await
        .unwrap();
    assert_eq!(open.state, TournamentState::Open);

    assert!(matches!(
        tournaments.delete(None, tournament.id).await,
        Err(TournamentError::NotInSetup(TournamentState::Open))
    ));

    let by_slug = tournaments
        .get_by_identifier(&tournament.identifier)
        .await
        .unwrap();
    assert_eq!(by_slug.id, tournament.id);

    let entries = AuditLog::new(pool)
        .list(&AuditFilter::for_tournament(tournament.id))
        .await
        .unwrap();
    assert_eq!(entries[0].action, AuditAction::TournamentTransitioned);
    assert_eq!(entries.last().unwrap().action, AuditAction::TournamentCreated);
}

#[tokio::test]
async fn test_participant_login_and_self_service() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let auth = AuthManager::new(pool.clone(), PEPPER.to_string(), SESSION_SECRET.to_string());
    let participants = ParticipantManager::new(pool.clone());
    let tournaments = TournamentManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    let ann = participants
        .create(None, tournament.id, new_participant("Ann", "Lee"))
        .await
        .unwrap();

    assert!(matches!(
        auth.login_participant("0000000000000000").await,
        Err(AuthError::InvalidLoginLink)
    ));
    let login = auth.login_participant(&ann.identifier).await.unwrap();
    assert_eq!(login.participant_id, ann.id);
    let principal = auth.verify_session(&login.session.token).await.unwrap();

    let updated = participants
        .update_profile(
            &principal,
            ann.id,
            ProfileUpdate {
                phone: Some("775-555-0100".to_string()),
                email: Some("Ann@Example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.email.as_deref(), Some("ann@example.com"));

    let cleared = participants
        .update_profile(
            &principal,
            ann.id,
            ProfileUpdate {
                phone: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.phone, None);

    let admin_field = participants
        .update_profile(
            &principal,
            ann.id,
            ProfileUpdate {
                average: Some(Some(200)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(admin_field, Err(ParticipantError::AdminOnlyFields(_))));

    tournaments
        .transition(None, tournament.id, TournamentState::Closed)
        .await
        .unwrap();
    let closed = participants
        .update_profile(
            &principal,
            ann.id,
            ProfileUpdate {
                city: Some("Reno".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(closed, Err(ParticipantError::RegistrationClosed)));

    // Admins may still edit after registration closes
    let by_admin = participants
        .update_profile(
            &SUPER_ADMIN,
            ann.id,
            ProfileUpdate {
                average: Some(Some(185)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_admin.average, Some(185));

    // Someone else's record is off limits
    let bob = participants
        .create(None, tournament.id, new_participant("Bob", "Ray"))
        .await
        .unwrap();
    let other = participants
        .update_profile(&principal, bob.id, ProfileUpdate::default())
        .await;
    assert!(matches!(other, Err(ParticipantError::Forbidden)));
}

#[tokio::test]
async fn test_doubles_pairing_and_search() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let participants = ParticipantManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;
    let elsewhere = create_tournament(&pool, TournamentState::Open).await;

    let ann = participants
        .create(None, tournament.id, new_participant("Ann", "Lee"))
        .await
        .unwrap();
    let bob = participants
        .create(None, tournament.id, new_participant("Bob", "Ray"))
        .await
        .unwrap();
    let cy = participants
        .create(None, tournament.id, new_participant("Cy", "Young"))
        .await
        .unwrap();
    let stranger = participants
        .create(None, elsewhere.id, new_participant("Di", "Ng"))
        .await
        .unwrap();

    assert!(matches!(
        participants.pair_doubles(None, ann.id, stranger.id).await,
        Err(ParticipantError::DifferentTournaments)
    ));

    let did = participants.pair_doubles(None, ann.id, bob.id).await.unwrap();
    assert_eq!(did, 1);
    let partner = participants.doubles_partner(ann.id).await.unwrap().unwrap();
    assert_eq!(partner.id, bob.id);

    assert!(matches!(
        participants.pair_doubles(None, cy.id, bob.id).await,
        Err(ParticipantError::AlreadyPaired(id)) if id == bob.id
    ));

    let unpaired = participants
        .search(&ParticipantFilter {
            has_partner: Some(false),
            ..ParticipantFilter::for_tournament(tournament.id)
        })
        .await
        .unwrap();
    assert_eq!(unpaired.iter().map(|p| p.id).collect::<Vec<_>>(), vec![cy.id]);

    let by_name = participants
        .search(&ParticipantFilter {
            name: Some("LE".to_string()),
            ..ParticipantFilter::for_tournament(tournament.id)
        })
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, ann.id);

    participants.unpair(None, bob.id).await.unwrap();
    assert!(participants.doubles_partner(ann.id).await.unwrap().is_none());
    assert!(matches!(
        participants.unpair(None, bob.id).await,
        Err(ParticipantError::NotPaired(_))
    ));
}

#[tokio::test]
async fn test_admin_update_is_all_or_nothing() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let auth = AuthManager::new(pool, PEPPER.to_string(), SESSION_SECRET.to_string());
    let email = format!("{}@example.com", unique("boss"));
    let boss = auth
        .create_admin(None, new_admin(&email, AdminRole::SuperAdmin))
        .await
        .unwrap();
    let acting = Principal::Admin {
        id: boss.id,
        role: AdminRole::SuperAdmin,
    };

    // Self-deactivation is refused before the password is touched
    let both = AdminUpdate {
        password: Some("NewPassword9Lanes".to_string()),
        is_active: Some(false),
    };
    assert!(matches!(
        auth.update_admin(&acting, boss.id, &both).await,
        Err(AuthError::Forbidden)
    ));
    auth.login_admin(&email, "Strikes4AndSpares")
        .await
        .expect("Old password should still work");

    assert!(matches!(
        auth.update_admin(&acting, boss.id, &AdminUpdate::default()).await,
        Err(AuthError::EmptyUpdate)
    ));
    let password_only = AdminUpdate {
        password: Some("NewPassword9Lanes".to_string()),
        is_active: None,
    };
    assert!(matches!(
        auth.update_admin(&acting, -42, &password_only).await,
        Err(AuthError::AdminNotFound(-42))
    ));

    let helper_email = format!("{}@example.com", unique("helper"));
    let helper = auth
        .create_admin(Some(&acting), new_admin(&helper_email, AdminRole::TournamentAdmin))
        .await
        .unwrap();
    let updated = auth
        .update_admin(
            &acting,
            helper.id,
            &AdminUpdate {
                password: Some("NewPassword9Lanes".to_string()),
                is_active: Some(false),
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert!(matches!(
        auth.login_admin(&helper_email, "NewPassword9Lanes").await,
        Err(AuthError::AccountDisabled)
    ));

    auth.set_admin_active(&acting, helper.id, true).await.unwrap();
    auth.set_admin_password(&acting, helper.id, "Another7Frame")
        .await
        .unwrap();
    auth.login_admin(&helper_email, "Another7Frame")
        .await
        .expect("Reactivated admin should log in with the new password");
}

#[tokio::test]
async fn test_concurrent_creates_report_conflicts() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let auth = AuthManager::new(pool.clone(), PEPPER.to_string(), SESSION_SECRET.to_string());
    let email = format!("{}@example.com", unique("race"));

    let mut admins = JoinSet::new();
    for _ in 0..4 {
        let auth = auth.clone();
        let request = new_admin(&email, AdminRole::TournamentAdmin);
        admins.spawn(async move { auth.create_admin(Some(&SUPER_ADMIN), request).await });
    }
    let mut created = 0;
    while let Some(result) = admins.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(AuthError::EmailTaken) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);

    let identifier = unique("race");
    let mut tournaments = JoinSet::new();
    for _ in 0..4 {
        let manager = TournamentManager::new(pool.clone());
        let request = NewTournament {
            identifier: identifier.clone(),
            name: "Race Open".to_string(),
            year: 2025,
            location: None,
            start_date: None,
            end_date: None,
            entry_deadline: None,
            handicap: None,
        };
        tournaments.spawn(async move { manager.create(None, request).await });
    }
    let mut created = 0;
    while let Some(result) = tournaments.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(TournamentError::IdentifierTaken(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_regenerated_identifier_retires_old_link() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let auth = AuthManager::new(pool.clone(), PEPPER.to_string(), SESSION_SECRET.to_string());
    let participants = ParticipantManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    let ann = participants
        .create(None, tournament.id, new_participant("Ann", "Lee"))
        .await
        .unwrap();
    let renewed = participants
        .regenerate_identifier(None, ann.id)
        .await
        .unwrap();
    assert_ne!(renewed.identifier, ann.identifier);

    assert!(matches!(
        participants.get_by_identifier(&ann.identifier).await,
        Err(ParticipantError::IdentifierNotFound)
    ));
    assert!(matches!(
        auth.login_participant(&ann.identifier).await,
        Err(AuthError::InvalidLoginLink)
    ));
    let login = auth.login_participant(&renewed.identifier).await.unwrap();
    assert_eq!(login.participant_id, ann.id);
}

#[tokio::test]
async fn test_tournament_admin_limited_to_assigned_participants() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let auth = AuthManager::new(pool.clone(), PEPPER.to_string(), SESSION_SECRET.to_string());
    let participants = ParticipantManager::new(pool.clone());
    let mine = create_tournament(&pool, TournamentState::Open).await;
    let theirs = create_tournament(&pool, TournamentState::Open).await;

    let admin = auth
        .create_admin(
            Some(&SUPER_ADMIN),
            new_admin(&format!("{}@example.com", unique("ta")), AdminRole::TournamentAdmin),
        )
        .await
        .unwrap();
    auth.assign_tournament(&SUPER_ADMIN, admin.id, mine.id)
        .await
        .unwrap();
    let principal = Principal::Admin {
        id: admin.id,
        role: AdminRole::TournamentAdmin,
    };

    let local = participants
        .create(None, mine.id, new_participant("Ann", "Lee"))
        .await
        .unwrap();
    let foreign = participants
        .create(None, theirs.id, new_participant("Bob", "Ray"))
        .await
        .unwrap();
    let update = ProfileUpdate {
        average: Some(Some(190)),
        ..Default::default()
    };

    assert!(matches!(
        participants
            .update_profile(&principal, foreign.id, update.clone())
            .await,
        Err(ParticipantError::Forbidden)
    ));
    assert_eq!(participants.get(foreign.id).await.unwrap().average, None);

    let edited = participants
        .update_profile(&principal, local.id, update)
        .await
        .unwrap();
    assert_eq!(edited.average, Some(190));
}

#[tokio::test]
async fn test_doubles_pair_holds_two_and_fields_clear() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let participants = ParticipantManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    let ann = participants
        .create(None, tournament.id, new_participant("Ann", "Lee"))
        .await
        .unwrap();
    let bob = participants
        .create(None, tournament.id, new_participant("Bob", "Ray"))
        .await
        .unwrap();
    let cy = participants
        .create(None, tournament.id, new_participant("Cy", "Young"))
        .await
        .unwrap();
    let did = participants.pair_doubles(None, ann.id, bob.id).await.unwrap();

    let join = ProfileUpdate {
        did: Some(Some(did)),
        ..Default::default()
    };
    assert!(matches!(
        participants
            .update_profile(&SUPER_ADMIN, cy.id, join.clone())
            .await,
        Err(ParticipantError::DoublesPairFull(full)) if full == did
    ));
    assert!(matches!(
        participants
            .create(
                None,
                tournament.id,
                NewParticipant {
                    did: Some(did),
                    ..new_participant("Di", "Ng")
                },
            )
            .await,
        Err(ParticipantError::DoublesPairFull(_))
    ));

    // Clearing Bob's DID frees the slot for Cy
    let bob = participants
        .update_profile(
            &SUPER_ADMIN,
            bob.id,
            ProfileUpdate {
                did: Some(None),
                average: Some(Some(170)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(bob.did, None);
    assert_eq!(bob.average, Some(170));
    let cy = participants
        .update_profile(&SUPER_ADMIN, cy.id, join)
        .await
        .unwrap();
    assert_eq!(cy.did, Some(did));
    assert_eq!(
        participants.doubles_partner(ann.id).await.unwrap().map(|p| p.id),
        Some(cy.id)
    );

    let bob = participants
        .update_profile(
            &SUPER_ADMIN,
            bob.id,
            ProfileUpdate {
                average: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(bob.average, None);
}

#[tokio::test]
async fn test_pairing_alongside_import_does_not_deadlock() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let participants = ParticipantManager::new(pool.clone());
    let imports = ImportManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    let ann = participants
        .create(None, tournament.id, new_participant("Ann", "Lee"))
        .await
        .unwrap();
    let bob = participants
        .create(None, tournament.id, new_participant("Bob", "Ray"))
        .await
        .unwrap();

    for round in 0..10 {
        let csv = format!(
            "First Name,Last Name,Average\nBob,Ray,{}\nAnn,Lee,{}\n",
            150 + round,
            200 - round
        );
        let (imported, paired) = tokio::join!(
            imports.import_registrations(None, tournament.id, csv.as_bytes()),
            async {
                participants.pair_doubles(None, ann.id, bob.id).await?;
                participants.unpair(None, ann.id).await
            }
        );
        let report = imported.expect("Import should not fail");
        assert_eq!(report.updated, 2);
        paired.expect("Pairing should not fail");
    }
}
