use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use super::{HistoryStore, StoreError};
use crate::metrics::DerivedSample;

/// History kept in one Redis sorted set, scored by timestamp in ms.
#[derive(Clone)]
pub struct RedisHistory {
    conn: ConnectionManager,
    key: String,
}

impl RedisHistory {
    pub fn new(conn: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }
}

pub fn score(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Decode sorted-set members; a document that no longer parses is
/// skipped so one bad entry cannot hide the rest of the range.
pub fn decode_members(members: Vec<String>) -> Vec<DerivedSample> {
    members
        .into_iter()
        .filter_map(|raw| match serde_json::from_str(&raw) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(error = %e, "skipping undecodable history document");
                None
            }
        })
        .collect()
}

/// Scores only resolve milliseconds: drop what precedes `since` inside
/// its millisecond and order same-millisecond members by full timestamp.
pub fn decode_range(members: Vec<String>, since: DateTime<Utc>) -> Vec<DerivedSample> {
    let mut samples: Vec<_> = decode_members(members)
        .into_iter()
        .filter(|s| s.timestamp >= since)
        .collect();
    samples.sort_by_key(|s| s.timestamp);
    samples
}

impl HistoryStore for RedisHistory {
    async fn append(&self, sample: &DerivedSample) -> Result<(), StoreError> {
        let doc = serde_json::to_string(sample)?;
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(&self.key, doc, score(sample.timestamp)).await?;
        Ok(())
    }

    async fn query_range(&self, since: DateTime<Utc>) -> Result<Vec<DerivedSample>, StoreError> {
        let mut conn = self.conn.clone();
        // ZRANGEBYSCORE replies in ascending score order.
        let members: Vec<String> = conn
            .zrangebyscore(&self.key, score(since), "+inf")
            .await?;
        Ok(decode_range(members, since))
    }
}
