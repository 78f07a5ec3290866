//! One generate-and-deliver run for a stream and period.
//!
//! The stream's dedup key stays locked from the dedup check until the new
//! record is committed, so overlapping runs for the same stream serialize
//! and only the first one past the check delivers. Runs for different
//! streams never contend.

use crate::capability::{Deliver, Generate};
use crate::config::Config;
use crate::dedup::{self, DedupRecord};
use crate::error::{CoachError, Result};
use crate::message;
use crate::prompt;
use crate::store::{Namespace, Store};
use crate::topic;
use crate::votes::{self, LedgerSeed};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Delivered {
        message_id: Option<String>,
        topic: String,
    },
    AlreadyDelivered,
}

pub struct DeliveryJob<'a> {
    store: &'a Store,
    config: &'a Config,
    generator: &'a dyn Generate,
    deliverer: &'a dyn Deliver,
}

impl<'a> DeliveryJob<'a> {
    pub fn new(
        store: &'a Store,
        config: &'a Config,
        generator: &'a dyn Generate,
        deliverer: &'a dyn Deliver,
    ) -> Self {
        Self {
            store,
            config,
            generator,
            deliverer,
        }
    }

    pub fn run(&self, stream_id: &str, period_key: &str) -> Result<RunOutcome> {
        let stream = self.config.stream(stream_id)?;
        let guard = self.store.lock(Namespace::Dedup, stream_id)?;

        let previous: Option<DedupRecord> = guard.read()?;
        if previous.as_ref().is_some_and(|r| r.covers(period_key)) {
            info!(stream = stream_id, period = period_key, "already delivered");
            return Ok(RunOutcome::AlreadyDelivered);
        }

        // A broken ledger must not block the day's delivery.
        let winner = topic::previous_winner(self.store, stream_id).unwrap_or_else(|e| {
            warn!(stream = stream_id, "could not read previous poll: {e}");
            None
        });
        let plan = topic::plan(&stream.topics, period_key, winner.as_deref(), stream.poll_size)
            .ok_or_else(|| CoachError::Config(format!("stream '{stream_id}' has no topics")))?;
        info!(
            stream = stream_id,
            period = period_key,
            topic = %plan.topic,
            voted = plan.voted,
            "generating"
        );

        let text = self
            .generator
            .generate(&prompt::build(stream, &plan.topic))
            .map_err(|e| match e {
                CoachError::GenerationFailed(_) => e,
                other => CoachError::GenerationFailed(other.to_string()),
            })?;
        if text.trim().is_empty() {
            return Err(CoachError::GenerationFailed(
                "model returned empty text".to_string(),
            ));
        }

        let outbound = message::render(stream, period_key, &plan, &text);
        let message_id = self.deliverer.deliver(&outbound).map_err(|e| match e {
            CoachError::DeliveryFailed(_) => e,
            other => CoachError::DeliveryFailed(other.to_string()),
        })?;

        let now = Utc::now();
        guard.write(&DedupRecord {
            stream_id: stream_id.to_string(),
            last_period: period_key.to_string(),
            last_message_id: message_id.clone(),
            content_hash: Some(dedup::content_hash(&text)),
            topic: Some(plan.topic.clone()),
            delivered_at: now,
        })?;
        drop(guard);
        info!(
            stream = stream_id,
            period = period_key,
            message_id = message_id.as_deref().unwrap_or("-"),
            "delivered"
        );

        if let Some(id) = &message_id {
            let seed = LedgerSeed {
                stream_id: Some(stream_id.to_string()),
                period: Some(period_key.to_string()),
                topic: Some(plan.topic.clone()),
                candidates: plan.candidates.clone(),
            };
            if let Err(e) = votes::seed(self.store, id, seed, now) {
                warn!(stream = stream_id, message_id = %id, "ledger seed failed: {e}");
            }
        }

        Ok(RunOutcome::Delivered {
            message_id,
            topic: plan.topic,
        })
    }
}
