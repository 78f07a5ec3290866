//! Vote ledger: aggregated votes per delivered message.
//!
//! Each message carries independent ballots (`feedback` for thumbs up/down,
//! `next_topic` for the poll). Within a ballot a user holds at most one
//! option; voting again moves them. Counts are always recomputed from the
//! voter sets, so `counts[option] == voters[option].len()`.

use crate::error::Result;
use crate::store::{Namespace, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const FEEDBACK_BALLOT: &str = "feedback";
pub const NEXT_TOPIC_BALLOT: &str = "next_topic";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub voters: BTreeMap<String, BTreeSet<String>>,
}

impl Ballot {
    /// Move `user_id` onto `option`, dropping any earlier choice.
    pub fn apply(&mut self, user_id: &str, option: &str) {
        for set in self.voters.values_mut() {
            set.remove(user_id);
        }
        self.voters
            .entry(option.to_string())
            .or_default()
            .insert(user_id.to_string());
        self.voters.retain(|_, set| !set.is_empty());
        self.recount();
    }

    fn recount(&mut self) {
        self.counts = self
            .voters
            .iter()
            .map(|(option, set)| (option.clone(), set.len() as u64))
            .collect();
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn choice_of(&self, user_id: &str) -> Option<&str> {
        self.voters
            .iter()
            .find(|(_, set)| set.contains(user_id))
            .map(|(option, _)| option.as_str())
    }

    /// Option with the most votes; ties go to the alphabetically first.
    pub fn leader(&self) -> Option<&str> {
        self.counts
            .iter()
            .filter(|(_, n)| **n > 0)
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(option, _)| option.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteLedger {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub ballots: BTreeMap<String, Ballot>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl VoteLedger {
    pub fn new(message_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            message_id: message_id.into(),
            stream_id: None,
            period: None,
            topic: None,
            candidates: Vec::new(),
            ballots: BTreeMap::new(),
            created_at: now,
            updated_at: None,
        }
    }

    pub fn ballot(&self, name: &str) -> Option<&Ballot> {
        self.ballots.get(name)
    }

    pub fn apply(&mut self, ballot: &str, user_id: &str, option: &str, now: DateTime<Utc>) {
        self.ballots
            .entry(ballot.to_string())
            .or_default()
            .apply(user_id, option);
        self.updated_at = Some(now);
    }

    /// Winning next-topic candidate, if anyone voted.
    pub fn next_topic_winner(&self) -> Option<&str> {
        self.ballot(NEXT_TOPIC_BALLOT).and_then(Ballot::leader)
    }
}

/// Delivery-time metadata used to seed a ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerSeed {
    pub stream_id: Option<String>,
    pub period: Option<String>,
    pub topic: Option<String>,
    pub candidates: Vec<String>,
}

/// One verified vote, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteCast {
    pub message_id: String,
    pub user_id: String,
    pub ballot: String,
    pub option: String,
    pub stream_id: Option<String>,
    pub period: Option<String>,
    pub topic: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load(store: &Store, message_id: &str) -> Result<Option<VoteLedger>> {
    store.get(Namespace::Votes, message_id)
}

/// Create an empty ledger for a freshly delivered message. An existing
/// ledger (a vote raced the seed) is kept and only missing metadata is filled.
pub fn seed(
    store: &Store,
    message_id: &str,
    meta: LedgerSeed,
    now: DateTime<Utc>,
) -> Result<VoteLedger> {
    store.put(Namespace::Votes, message_id, |current: Option<VoteLedger>| {
        let mut ledger = current.unwrap_or_else(|| VoteLedger::new(message_id, now));
        fill_meta(&mut ledger, meta.stream_id, meta.period, meta.topic);
        if ledger.candidates.is_empty() {
            ledger.candidates = meta.candidates;
        }
        ledger
    })
}

/// Apply a vote under the ledger's lock, creating the ledger if needed.
pub fn record(store: &Store, cast: &VoteCast, now: DateTime<Utc>) -> Result<VoteLedger> {
    let ledger = store.put(
        Namespace::Votes,
        &cast.message_id,
        |current: Option<VoteLedger>| {
            let mut ledger = current.unwrap_or_else(|| VoteLedger::new(&cast.message_id, now));
            fill_meta(
                &mut ledger,
                cast.stream_id.clone(),
                cast.period.clone(),
                cast.topic.clone(),
            );
            ledger.apply(&cast.ballot, &cast.user_id, &cast.option, now);
            ledger
        },
    )?;
    tracing::info!(
        message_id = %cast.message_id,
        user = %cast.user_id,
        ballot = %cast.ballot,
        option = %cast.option,
        "vote recorded"
    );
    Ok(ledger)
}

fn fill_meta(
    ledger: &mut VoteLedger,
    stream_id: Option<String>,
    period: Option<String>,
    topic: Option<String>,
) {
    if ledger.stream_id.is_none() {
        ledger.stream_id = stream_id;
    }
    if ledger.period.is_none() {
        ledger.period = period;
    }
    if ledger.topic.is_none() {
        ledger.topic = topic;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn cast(user: &str, ballot: &str, option: &str) -> VoteCast {
        VoteCast {
            message_id: "1770000000.000100".into(),
            user_id: user.into(),
            ballot: ballot.into(),
            option: option.into(),
            stream_id: Some("team-a".into()),
            period: Some("2026-02-07".into()),
            topic: Some("BRIN indexes".into()),
        }
    }

    fn assert_invariants(ballot: &Ballot, distinct_users: usize) {
        assert_eq!(ballot.total() as usize, distinct_users);
        for (option, set) in &ballot.voters {
            assert_eq!(ballot.counts[option], set.len() as u64);
        }
        let mut seen = BTreeSet::new();
        for set in ballot.voters.values() {
            for user in set {
                assert!(seen.insert(user.clone()), "{user} counted twice");
            }
        }
    }

    #[test]
    fn changing_vote_moves_count() {
        let mut ballot = Ballot::default();
        ballot.apply("u1", "thumbs_up");
        ballot.apply("u1", "thumbs_down");
        assert_eq!(ballot.counts.get("thumbs_up"), None);
        assert_eq!(ballot.counts["thumbs_down"], 1);
        assert_eq!(ballot.choice_of("u1"), Some("thumbs_down"));
        assert_invariants(&ballot, 1);
    }

    #[test]
    fn repeated_vote_is_idempotent() {
        let mut ballot = Ballot::default();
        ballot.apply("u1", "thumbs_up");
        ballot.apply("u1", "thumbs_up");
        assert_eq!(ballot.counts["thumbs_up"], 1);
    }

    #[test]
    fn any_vote_sequence_keeps_one_choice_per_user() {
        let mut ballot = Ballot::default();
        let seq = [
            ("u1", "a"),
            ("u2", "b"),
            ("u1", "b"),
            ("u3", "a"),
            ("u2", "c"),
            ("u1", "a"),
            ("u3", "a"),
            ("u4", "c"),
        ];
        let mut users = BTreeSet::new();
        for (user, option) in seq {
            ballot.apply(user, option);
            users.insert(user);
            assert_eq!(ballot.choice_of(user), Some(option));
            assert_invariants(&ballot, users.len());
        }
    }

    #[test]
    fn leader_breaks_ties_alphabetically() {
        let mut ballot = Ballot::default();
        ballot.apply("u1", "vacuum");
        ballot.apply("u2", "indexes");
        assert_eq!(ballot.leader(), Some("indexes"));
        ballot.apply("u3", "vacuum");
        assert_eq!(ballot.leader(), Some("vacuum"));
    }

    #[test]
    fn empty_ballot_has_no_leader() {
        assert_eq!(Ballot::default().leader(), None);
    }

    #[test]
    fn ballots_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let now = Utc::now();
        record(&store, &cast("alice", FEEDBACK_BALLOT, "thumbs_up"), now).unwrap();
        let ledger = record(&store, &cast("alice", NEXT_TOPIC_BALLOT, "indexes"), now).unwrap();
        assert_eq!(ledger.ballot(FEEDBACK_BALLOT).unwrap().counts["thumbs_up"], 1);
        assert_eq!(ledger.next_topic_winner(), Some("indexes"));
    }

    #[test]
    fn record_creates_ledger_lazily_with_metadata() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(load(&store, "1770000000.000100").unwrap().is_none());
        record(&store, &cast("bob", FEEDBACK_BALLOT, "thumbs_down"), Utc::now()).unwrap();
        let ledger = load(&store, "1770000000.000100").unwrap().unwrap();
        assert_eq!(ledger.stream_id.as_deref(), Some("team-a"));
        assert_eq!(ledger.period.as_deref(), Some("2026-02-07"));
        assert!(ledger.updated_at.is_some());
    }

    #[test]
    fn seed_keeps_votes_that_arrived_first() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        record(&store, &cast("bob", FEEDBACK_BALLOT, "thumbs_up"), Utc::now()).unwrap();
        let ledger = seed(
            &store,
            "1770000000.000100",
            LedgerSeed {
                candidates: vec!["a".into(), "b".into()],
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(ledger.ballot(FEEDBACK_BALLOT).unwrap().total(), 1);
        assert_eq!(ledger.candidates, vec!["a", "b"]);
    }

    #[test]
    fn concurrent_votes_from_distinct_users_all_count() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let option = if i % 2 == 0 { "thumbs_up" } else { "thumbs_down" };
                    record(&store, &cast(&format!("u{i}"), FEEDBACK_BALLOT, option), Utc::now())
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let ledger = load(&store, "1770000000.000100").unwrap().unwrap();
        let ballot = ledger.ballot(FEEDBACK_BALLOT).unwrap();
        assert_eq!(ballot.counts["thumbs_up"], 8);
        assert_eq!(ballot.counts["thumbs_down"], 8);
        assert_invariants(ballot, 16);
    }
}
