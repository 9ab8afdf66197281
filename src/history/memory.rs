use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{HistoryStore, StoreError};
use crate::metrics::DerivedSample;

/// In-process history, lost on restart. Kept sorted by timestamp.
#[derive(Default)]
pub struct MemoryHistory {
    samples: Mutex<Vec<DerivedSample>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

impl HistoryStore for MemoryHistory {
    async fn append(&self, sample: &DerivedSample) -> Result<(), StoreError> {
        let mut samples = self.samples.lock();
        // Equal timestamps keep arrival order.
        let idx = samples.partition_point(|s| s.timestamp <= sample.timestamp);
        samples.insert(idx, sample.clone());
        Ok(())
    }

    async fn query_range(&self, since: DateTime<Utc>) -> Result<Vec<DerivedSample>, StoreError> {
        let samples = self.samples.lock();
        let start = samples.partition_point(|s| s.timestamp < since);
        Ok(samples[start..].to_vec())
    }
}
