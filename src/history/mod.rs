pub mod memory;
pub mod redis_store;

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::metrics::DerivedSample;

pub use memory::MemoryHistory;
pub use redis_store::RedisHistory;

/// Lookback used when the caller gives none, or gives garbage.
pub const DEFAULT_LOOKBACK_HOURS: f64 = 1.0;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history backend error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("history document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Append-only, time-indexed store of derived samples.
pub trait HistoryStore: Send + Sync {
    fn append(
        &self,
        sample: &DerivedSample,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every sample with `timestamp >= since`, oldest first.
    fn query_range(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<DerivedSample>, StoreError>> + Send;
}

// ─── Lookback window ─────────────────────────────────────────────

/// How far back a history query reaches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookback {
    hours: f64,
}

impl Lookback {
    /// Accepts any finite positive number of hours; everything else
    /// (absent, non-numeric, zero, negative) becomes the default.
    pub fn from_hours(hours: Option<f64>) -> Self {
        match hours {
            Some(h) if h.is_finite() && h > 0.0 => Self { hours: h },
            _ => Self::default(),
        }
    }

    /// Parse the raw `hours` query parameter.
    pub fn parse(raw: Option<&str>) -> Self {
        Self::from_hours(raw.and_then(|s| s.trim().parse().ok()))
    }

    pub fn hours(&self) -> f64 {
        self.hours
    }

    /// Absolute cutoff for a query issued at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let ms = (self.hours * 3_600_000.0).round();
        // Beyond this chrono cannot represent the offset; clamp to the epoch.
        if ms >= i64::MAX as f64 {
            return DateTime::<Utc>::UNIX_EPOCH;
        }
        match Duration::try_milliseconds(ms as i64) {
            Some(d) => now.checked_sub_signed(d).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            None => DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self {
            hours: DEFAULT_LOOKBACK_HOURS,
        }
    }
}

// ─── Configured backend ──────────────────────────────────────────

/// The store chosen at startup.
pub enum HistoryBackend {
    Redis(RedisHistory),
    Memory(MemoryHistory),
}

impl HistoryStore for HistoryBackend {
    async fn append(&self, sample: &DerivedSample) -> Result<(), StoreError> {
        match self {
            Self::Redis(s) => s.append(sample).await,
            Self::Memory(s) => s.append(sample).await,
        }
    }

    async fn query_range(&self, since: DateTime<Utc>) -> Result<Vec<DerivedSample>, StoreError> {
        match self {
            Self::Redis(s) => s.query_range(since).await,
            Self::Memory(s) => s.query_range(since).await,
        }
    }
}
