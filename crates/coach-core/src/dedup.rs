//! Per-stream record of the last successfully delivered period.

use crate::error::Result;
use crate::store::{Namespace, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub stream_id: String,
    pub last_period: String,
    pub last_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

impl DedupRecord {
    pub fn covers(&self, period_key: &str) -> bool {
        self.last_period == period_key
    }
}

pub fn load(store: &Store, stream_id: &str) -> Result<Option<DedupRecord>> {
    store.get(Namespace::Dedup, stream_id)
}

/// Hex SHA-256 of the delivered text, kept for audit.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
