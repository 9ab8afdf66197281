use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::counters::{CounterSource, ProviderError};
use crate::history::{HistoryStore, Lookback, StoreError};
use crate::metrics::{DerivedSample, RateDeriver};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One monitored target: its counter source, its deriver and where its
/// samples go.
///
/// Sampling cycles (read, derive, persist) run one at a time behind
/// `cycle`; overlapping callers queue instead of sharing a baseline.
/// History reads never take that lock.
pub struct Sampler<S, H> {
    source: S,
    store: H,
    deriver: RateDeriver,
    cycle: Mutex<()>,
}

impl<S: CounterSource, H: HistoryStore> Sampler<S, H> {
    pub fn new(source: S, store: H) -> Self {
        Self {
            source,
            store,
            deriver: RateDeriver::new(),
            cycle: Mutex::new(()),
        }
    }

    /// Run one sampling cycle and return the persisted sample.
    ///
    /// The baseline advances before the store write, so a failed write
    /// still moves the next interval forward.
    pub async fn sample(&self) -> Result<DerivedSample, SampleError> {
        let _cycle = self.cycle.lock().await;

        let snapshot = self.source.read_counters().await?;
        let primed = self.deriver.is_primed();
        let sample = self.deriver.derive(snapshot);

        self.store.append(&sample).await?;

        debug!(
            timestamp = %sample.timestamp,
            baseline = !primed,
            cpu = sample.reading.cpu.usage_percent,
            "sample stored"
        );
        Ok(sample)
    }

    pub async fn history(&self, lookback: Lookback) -> Result<Vec<DerivedSample>, StoreError> {
        self.history_at(lookback, Utc::now()).await
    }

    /// History relative to an explicit `now`.
    pub async fn history_at(
        &self,
        lookback: Lookback,
        now: DateTime<Utc>,
    ) -> Result<Vec<DerivedSample>, StoreError> {
        self.store.query_range(lookback.since(now)).await
    }

    #[cfg(test)]
    pub fn deriver(&self) -> &RateDeriver {
        &self.deriver
    }

    #[cfg(test)]
    pub fn store(&self) -> &H {
        &self.store
    }
}
