//! Matching imported rows to existing participants.
//!
//! Keys are tried in a fixed order and the first hit wins: legacy PID, USBC
//! ID, email, then normalised full name. A name shared by several
//! participants is reported as ambiguous rather than guessed.

use super::normalize::{email_key, name_key};
use crate::participant::ParticipantId;
use std::collections::HashMap;

/// Identifying fields of an existing participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub id: ParticipantId,
    pub pid: Option<i64>,
    pub usbc_id: Option<String>,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

/// Identifying fields of an imported row
#[derive(Debug, Clone, Copy, Default)]
pub struct RowKey<'a> {
    pub pid: Option<i64>,
    pub usbc_id: Option<&'a str>,
    pub email: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

/// Which key produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Pid,
    UsbcId,
    Email,
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(ParticipantId, MatchedBy),
    /// Several participants share the row's normalised name
    Ambiguous(Vec<ParticipantId>),
    NoMatch,
}

/// In-memory index over one tournament's participants
///
/// The index mirrors the rows as the import rewrites them: re-inserting a
/// participant drops the keys it no longer carries.
#[derive(Debug, Default)]
pub struct Matcher {
    indexed: HashMap<ParticipantId, Candidate>,
    by_pid: HashMap<i64, ParticipantId>,
    by_usbc: HashMap<String, ParticipantId>,
    by_email: HashMap<String, Vec<ParticipantId>>,
    by_name: HashMap<String, Vec<ParticipantId>>,
}

impl Matcher {
    pub fn new(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        let mut matcher = Self::default();
        for candidate in candidates {
            matcher.insert(candidate);
        }
        matcher
    }

    /// Index a participant, replacing whatever was indexed for it before;
    /// later rows of the same file can then match it
    pub fn insert(&mut self, candidate: Candidate) {
        let id = candidate.id;
        if let Some(previous) = self.indexed.remove(&id) {
            self.unindex(&previous);
        }

        if let Some(pid) = candidate.pid {
            self.by_pid.insert(pid, id);
        }
        if let Some(usbc) = candidate.usbc_id.as_deref().and_then(usbc_key) {
            self.by_usbc.entry(usbc).or_insert(id);
        }
        if let Some(email) = candidate.email.as_deref().and_then(email_key) {
            push_unique(self.by_email.entry(email).or_default(), id);
        }
        let name = name_key(&candidate.first_name, &candidate.last_name);
        if !name.is_empty() {
            push_unique(self.by_name.entry(name).or_default(), id);
        }
        self.indexed.insert(id, candidate);
    }

    /// Fields currently indexed for a participant
    pub fn get(&self, id: ParticipantId) -> Option<&Candidate> {
        self.indexed.get(&id)
    }

    fn unindex(&mut self, candidate: &Candidate) {
        let id = candidate.id;
        if let Some(pid) = candidate.pid {
            if self.by_pid.get(&pid) == Some(&id) {
                self.by_pid.remove(&pid);
            }
        }
        if let Some(usbc) = candidate.usbc_id.as_deref().and_then(usbc_key) {
            if self.by_usbc.get(&usbc) == Some(&id) {
                self.by_usbc.remove(&usbc);
            }
        }
        if let Some(email) = candidate.email.as_deref().and_then(email_key) {
            remove_id(&mut self.by_email, email, id);
        }
        remove_id(
            &mut self.by_name,
            name_key(&candidate.first_name, &candidate.last_name),
            id,
        );
    }

    pub fn find(&self, key: &RowKey<'_>) -> MatchOutcome {
        if let Some(&id) = key.pid.and_then(|pid| self.by_pid.get(&pid)) {
            return MatchOutcome::Matched(id, MatchedBy::Pid);
        }

        if let Some(&id) = key
            .usbc_id
            .and_then(usbc_key)
            .and_then(|usbc| self.by_usbc.get(&usbc))
        {
            return MatchOutcome::Matched(id, MatchedBy::UsbcId);
        }

        // A shared family address is not an identity; fall through to names
        if let Some([id]) = key
            .email
            .and_then(email_key)
            .and_then(|email| self.by_email.get(&email))
            .map(Vec::as_slice)
        {
            return MatchOutcome::Matched(*id, MatchedBy::Email);
        }

        if let (Some(first), Some(last)) = (key.first_name, key.last_name) {
            let name = name_key(first, last);
            match self.by_name.get(&name).map(Vec::as_slice) {
                Some([id]) if !name.is_empty() => {
                    return MatchOutcome::Matched(*id, MatchedBy::Name);
                }
                Some(ids) if ids.len() > 1 => return MatchOutcome::Ambiguous(ids.to_vec()),
                _ => {}
            }
        }

        MatchOutcome::NoMatch
    }
}

fn usbc_key(usbc_id: &str) -> Option<String> {
    let key: String = usbc_id
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!key.is_empty()).then_some(key)
}

fn push_unique(ids: &mut Vec<ParticipantId>, id: ParticipantId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn remove_id(index: &mut HashMap<String, Vec<ParticipantId>>, key: String, id: ParticipantId) {
    if let Some(ids) = index.get_mut(&key) {
        ids.retain(|&other| other != id);
        if ids.is_empty() {
            index.remove(&key);
        }
    }
}
