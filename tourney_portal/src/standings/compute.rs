//! Pure standings computation and ranking.

use super::models::{BowlerScores, Event, ScoreEvent, StandingRow};
use crate::tournament::HandicapRule;
use std::{cmp::Ordering, collections::BTreeMap};

/// Games a bowler must complete in each event to appear in all events
pub const GAMES_PER_EVENT: usize = 3;

/// Build the ranked table for `event`
pub fn compute_standings(
    bowlers: &[BowlerScores],
    rule: &HandicapRule,
    event: Event,
) -> Vec<StandingRow> {
    let mut rows = match event {
        Event::Singles => individual_rows(bowlers, rule, &[ScoreEvent::Singles], 1),
        Event::AllEvents => individual_rows(bowlers, rule, &ScoreEvent::ALL, GAMES_PER_EVENT),
        Event::Doubles => group_rows(
            bowlers,
            rule,
            ScoreEvent::Doubles,
            |b| b.did,
            |did, members| format!("Pair {did}: {}", members.join(" & ")),
        ),
        Event::Team => group_rows(
            bowlers,
            rule,
            ScoreEvent::Team,
            |b| b.team_id,
            |team_id, _| {
                bowlers
                    .iter()
                    .find(|b| b.team_id == Some(team_id))
                    .and_then(|b| b.team_name.clone())
                    .unwrap_or_else(|| format!("Team {team_id}"))
            },
        ),
    };

    rank_rows(&mut rows);
    rows
}

/// One row per bowler over `events`
///
/// A bowler appears when they bowled at least `min_games_per_event` games in
/// every listed event.
fn individual_rows(
    bowlers: &[BowlerScores],
    rule: &HandicapRule,
    events: &[ScoreEvent],
    min_games_per_event: usize,
) -> Vec<StandingRow> {
    bowlers
        .iter()
        .filter(|bowler| {
            events
                .iter()
                .all(|&event| bowler.scores_in(event).count() >= min_games_per_event)
        })
        .map(|bowler| {
            let scores: Vec<i16> = events
                .iter()
                .flat_map(|&event| bowler.scores_in(event))
                .collect();
            let games = scores.len() as u32;
            let scratch = scores.iter().map(|&s| i32::from(s)).sum();
            let handicap = rule.handicap_for(bowler.average) * games as i32;
            StandingRow {
                rank: 0,
                name: bowler.name.clone(),
                members: vec![bowler.name.clone()],
                games,
                scratch,
                handicap,
                total: scratch + handicap,
            }
        })
        .collect()
}

/// One row per group (doubles pair or team) summing members' `event` games
fn group_rows(
    bowlers: &[BowlerScores],
    rule: &HandicapRule,
    event: ScoreEvent,
    group_of: impl Fn(&BowlerScores) -> Option<i64>,
    name_of: impl Fn(i64, &[String]) -> String,
) -> Vec<StandingRow> {
    let mut groups: BTreeMap<i64, Vec<&BowlerScores>> = BTreeMap::new();
    for bowler in bowlers {
        if let Some(group) = group_of(bowler) {
            groups.entry(group).or_default().push(bowler);
        }
    }

    groups
        .into_iter()
        .filter_map(|(group, mut members)| {
            members.sort_by_key(|b| b.participant_id);

            let mut games = 0u32;
            let mut scratch = 0i32;
            let mut handicap = 0i32;
            for member in &members {
                let count = member.scores_in(event).count() as i32;
                games += count as u32;
                scratch += member.scores_in(event).map(i32::from).sum::<i32>();
                handicap += rule.handicap_for(member.average) * count;
            }
            if games == 0 {
                return None;
            }

            let names: Vec<String> = members.iter().map(|b| b.name.clone()).collect();
            Some(StandingRow {
                rank: 0,
                name: name_of(group, &names),
                members: names,
                games,
                scratch,
                handicap,
                total: scratch + handicap,
            })
        })
        .collect()
}

/// Sort by total, then scratch (both descending), then name, and assign
/// standard competition ranks: rows equal on total and scratch share a rank
/// and the next rank skips accordingly.
pub fn rank_rows(rows: &mut [StandingRow]) {
    rows.sort_by(compare_rows);

    let mut previous: Option<(i32, i32, u32)> = None;
    for (index, row) in rows.iter_mut().enumerate() {
        let rank = match previous {
            Some((total, scratch, rank)) if total == row.total && scratch == row.scratch => rank,
            _ => index as u32 + 1,
        };
        row.rank = rank;
        previous = Some((row.total, row.scratch, rank));
    }
}

fn compare_rows(a: &StandingRow, b: &StandingRow) -> Ordering {
    b.total
        .cmp(&a.total)
        .then_with(|| b.scratch.cmp(&a.scratch))
        .then_with(|| a.name.cmp(&b.name))
}
