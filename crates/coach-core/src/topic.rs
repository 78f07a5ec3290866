//! Topic selection for a period and the next-topic poll that rides along
//! with each delivered message.

use crate::dedup;
use crate::error::Result;
use crate::period;
use crate::store::{Namespace, Store};
use crate::votes::{self, Ballot, NEXT_TOPIC_BALLOT};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicPlan {
    pub topic: String,
    /// Candidates offered in the next-topic poll.
    pub candidates: Vec<String>,
    /// True when the topic came from the previous message's poll.
    pub voted: bool,
}

/// Pick the topic for `period_key` and the poll candidates.
///
/// A poll winner is used only while it is still in the configured list.
/// Returns `None` for an empty topic list.
pub fn plan(
    topics: &[String],
    period_key: &str,
    poll_winner: Option<&str>,
    poll_size: usize,
) -> Option<TopicPlan> {
    if topics.is_empty() {
        return None;
    }
    let seeded = (period::seed(period_key) % topics.len() as u64) as usize;
    let (index, voted) = match poll_winner.and_then(|w| topics.iter().position(|t| t == w)) {
        Some(i) => (i, true),
        None => (seeded, false),
    };

    let candidates = (1..topics.len())
        .map(|step| &topics[(index + step) % topics.len()])
        .take(poll_size)
        .cloned()
        .collect();

    Some(TopicPlan {
        topic: topics[index].clone(),
        candidates,
        voted,
    })
}

/// Winning next-topic vote on the stream's previously delivered message.
///
/// Webhook deliveries return no message id, so their ledgers are found by
/// the stream and period carried in the button metadata instead.
pub fn previous_winner(store: &Store, stream_id: &str) -> Result<Option<String>> {
    let Some(record) = dedup::load(store, stream_id)? else {
        return Ok(None);
    };
    match &record.last_message_id {
        Some(message_id) => Ok(votes::load(store, message_id)?
            .and_then(|ledger| ledger.next_topic_winner().map(str::to_string))),
        None => winner_for_period(store, stream_id, &record.last_period),
    }
}

fn winner_for_period(store: &Store, stream_id: &str, period_key: &str) -> Result<Option<String>> {
    let mut tally = Ballot::default();
    for key in store.keys(Namespace::Votes)? {
        let ledger = match votes::load(store, &key) {
            Ok(Some(ledger)) => ledger,
            Ok(None) => continue,
            Err(e) => {
                warn!(ledger = %key, "skipping unreadable vote ledger: {e}");
                continue;
            }
        };
        if ledger.stream_id.as_deref() != Some(stream_id)
            || ledger.period.as_deref() != Some(period_key)
        {
            continue;
        }
        if let Some(ballot) = ledger.ballot(NEXT_TOPIC_BALLOT) {
            for (option, n) in &ballot.counts {
                *tally.counts.entry(option.clone()).or_default() += n;
            }
        }
    }
    Ok(tally.leader().map(str::to_string))
}
