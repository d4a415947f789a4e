//! Integration tests for registration/score imports and standings.

mod common;

use common::{create_tournament, setup_test_db};
use tourney_portal::{
    import::{ImportError, ImportManager, ScoreFormat},
    participant::{NewParticipant, ParticipantFilter, ParticipantManager},
    standings::{Event, StandingsManager},
    tournament::TournamentState,
};

const REGISTRATIONS: &str = "\
PID,First Name,Last Name,Email,Average,Team,DID
1,Ann,Lee,ann@example.com,200,Strikers,1
2,Bob,Ray,,180,Strikers,1
3,Cy,Young,,,Spares,
,Nameless,,,,,
";

#[tokio::test]
async fn test_registration_import_creates_then_updates() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let imports = ImportManager::new(pool.clone());
    let participants = ParticipantManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    let report = imports
        .import_registrations(None, tournament.id, REGISTRATIONS.as_bytes())
        .await
        .expect("Import should succeed");
    assert_eq!(report.created, 3);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 5);

    let teams = participants.list_teams(tournament.id).await.unwrap();
    let mut names: Vec<_> = teams.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Spares", "Strikers"]);

    let duplicate = imports
        .import_registrations(None, tournament.id, REGISTRATIONS.as_bytes())
        .await;
    assert!(matches!(duplicate, Err(ImportError::DuplicateImport)));

    // Matched by email even without a PID; only present fields change
    let correction = "First Name,Last Name,Email,Average\nAnn,Lee,ANN@example.com ,205\n";
    let report = imports
        .import_registrations(None, tournament.id, correction.as_bytes())
        .await
        .unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);

    let all = participants
        .search(&ParticipantFilter::for_tournament(tournament.id))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    let ann = all.iter().find(|p| p.first_name == "Ann").unwrap();
    assert_eq!(ann.average, Some(205));
    assert_eq!(ann.pid, Some(1));
    assert_eq!(ann.did, Some(1));
    assert!(ann.team_id.is_some());
}

#[tokio::test]
async fn test_registration_import_rejected_when_completed() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let tournament = create_tournament(&pool, TournamentState::Completed).await;
    let result = ImportManager::new(pool)
        .import_registrations(None, tournament.id, REGISTRATIONS.as_bytes())
        .await;
    assert!(matches!(result, Err(ImportError::TournamentCompleted)));
}

#[tokio::test]
async fn test_score_import_and_standings() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let imports = ImportManager::new(pool.clone());
    let standings = StandingsManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    imports
        .import_registrations(None, tournament.id, REGISTRATIONS.as_bytes())
        .await
        .unwrap();

    let scores = "\
PID,Event,Game1,Game2,Game3
1,singles,200,210,190
2,singles,150,160,170
99,singles,100,100,100
";
    let report = imports
        .import_scores(None, tournament.id, ScoreFormat::Csv, scores.as_bytes())
        .await
        .unwrap();
    assert_eq!(report.scores, 6);
    assert_eq!(report.skipped.len(), 1, "Unknown PID should be reported");

    // Default rule 220 base, 80%: Ann 16/game, Bob 32/game
    let rows = standings.compute(tournament.id, Event::Singles).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Ann Lee");
    assert_eq!(rows[0].scratch, 600);
    assert_eq!(rows[0].handicap, 48);
    assert_eq!(rows[0].total, 648);
    assert_eq!(rows[1].name, "Bob Ray");
    assert_eq!(rows[1].total, 576);
    assert_eq!(rows[1].rank, 2);

    let xml = format!(
        r#"<scores tournament="{}">
  <bowler pid="1" first="Ann" last="Lee">
    <game event="doubles" number="1">180</game>
  </bowler>
  <bowler pid="2" first="Bob" last="Ray">
    <game event="doubles" number="1">170</game>
  </bowler>
</scores>"#,
        tournament.identifier
    );
    let report = imports
        .import_scores(None, tournament.id, ScoreFormat::Xml, xml.as_bytes())
        .await
        .unwrap();
    assert_eq!(report.scores, 2);

    let doubles = standings.compute(tournament.id, Event::Doubles).await.unwrap();
    assert_eq!(doubles.len(), 1);
    assert_eq!(doubles[0].scratch, 350);
    assert_eq!(doubles[0].members.len(), 2);
}

#[tokio::test]
async fn test_pid_moved_within_one_import() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let imports = ImportManager::new(pool.clone());
    let participants = ParticipantManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    imports
        .import_registrations(
            None,
            tournament.id,
            b"PID,First Name,Last Name,Email\n1,Ann,Lee,ann@example.com\n",
        )
        .await
        .unwrap();

    // Ann gives up PID 1 on the first row; the second row must not find her by it
    let moved = "\
PID,First Name,Last Name,Email
7,Ann,Lee,ann@example.com
1,Zed,Quinn,zed@example.com
";
    let report = imports
        .import_registrations(None, tournament.id, moved.as_bytes())
        .await
        .unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 1);
    assert!(report.skipped.is_empty());

    let all = participants
        .search(&ParticipantFilter::for_tournament(tournament.id))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    let ann = all.iter().find(|p| p.first_name == "Ann").unwrap();
    assert_eq!(ann.pid, Some(7));
    let zed = all.iter().find(|p| p.first_name == "Zed").unwrap();
    assert_eq!(zed.pid, Some(1));
}

#[tokio::test]
async fn test_ambiguous_name_row_is_skipped() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let imports = ImportManager::new(pool.clone());
    let participants = ParticipantManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    for _ in 0..2 {
        participants
            .create(
                None,
                tournament.id,
                NewParticipant {
                    first_name: "Sam".to_string(),
                    last_name: "Smith".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let report = imports
        .import_registrations(
            None,
            tournament.id,
            b"First Name,Last Name,Average\nSam,Smith,190\n",
        )
        .await
        .unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 2);

    let all = participants
        .search(&ParticipantFilter::for_tournament(tournament.id))
        .await
        .unwrap();
    assert!(all.iter().all(|p| p.average.is_none()));
}

#[tokio::test]
async fn test_registration_row_cannot_overfill_doubles_pair() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let imports = ImportManager::new(pool.clone());
    let participants = ParticipantManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    imports
        .import_registrations(None, tournament.id, REGISTRATIONS.as_bytes())
        .await
        .unwrap();

    let report = imports
        .import_registrations(
            None,
            tournament.id,
            b"First Name,Last Name,DID\nCy,Young,1\nAnn,Lee,1\n",
        )
        .await
        .unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 2);
    assert_eq!(report.updated, 1, "Ann already holds DID 1");

    let all = participants
        .search(&ParticipantFilter::for_tournament(tournament.id))
        .await
        .unwrap();
    let cy = all.iter().find(|p| p.first_name == "Cy").unwrap();
    assert_eq!(cy.did, None);
    assert_eq!(all.iter().filter(|p| p.did == Some(1)).count(), 2);
}

#[tokio::test]
async fn test_score_xml_for_another_tournament_is_rejected() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let imports = ImportManager::new(pool.clone());
    let tournament = create_tournament(&pool, TournamentState::Open).await;

    imports
        .import_registrations(None, tournament.id, REGISTRATIONS.as_bytes())
        .await
        .unwrap();

    let xml = r#"<scores tournament="other-slug">
  <bowler pid="1" first="Ann" last="Lee">
    <game event="singles" number="1">200</game>
  </bowler>
</scores>"#;
    let result = imports
        .import_scores(None, tournament.id, ScoreFormat::Xml, xml.as_bytes())
        .await;
    assert!(matches!(
        result,
        Err(ImportError::TournamentMismatch { ref found, .. }) if found == "other-slug"
    ));

    // Nothing recorded, so the right file still imports
    let fixed = xml.replace("other-slug", &tournament.identifier);
    let report = imports
        .import_scores(None, tournament.id, ScoreFormat::Xml, fixed.as_bytes())
        .await
        .unwrap();
    assert_eq!(report.scores, 1);
}
