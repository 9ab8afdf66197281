//! Fakes shared by the unit tests: a scripted counter source, a store
//! that refuses writes, and snapshot builders.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use crate::counters::{
    ConnectionGauges, CounterSnapshot, CounterSource, CpuTimes, MemoryGauges, NetworkCounters,
    OperationCounters, ProviderError,
};
use crate::history::{HistoryStore, StoreError};
use crate::metrics::{DerivedSample, MetricsReading};

/// Hands out queued snapshots; an exhausted queue is a read failure.
pub struct ScriptedSource {
    queue: Mutex<VecDeque<CounterSnapshot>>,
}

impl ScriptedSource {
    pub fn new(snaps: impl IntoIterator<Item = CounterSnapshot>) -> Self {
        Self {
            queue: Mutex::new(snaps.into_iter().collect()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl CounterSource for ScriptedSource {
    async fn read_counters(&self) -> Result<CounterSnapshot, ProviderError> {
        self.queue
            .lock()
            .pop_front()
            .ok_or_else(|| ProviderError::MalformedProcStat {
                path: "/scripted".into(),
            })
    }
}

/// Store whose writes always fail, counting attempts.
#[derive(Default)]
pub struct BrokenStore {
    pub attempts: AtomicUsize,
}

impl BrokenStore {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl HistoryStore for BrokenStore {
    async fn append(&self, _: &DerivedSample) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Encoding(
            serde_json::from_str::<()>("x").unwrap_err(),
        ))
    }

    async fn query_range(&self, _: DateTime<Utc>) -> Result<Vec<DerivedSample>, StoreError> {
        Err(StoreError::Encoding(
            serde_json::from_str::<()>("x").unwrap_err(),
        ))
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Snapshot `secs` after [`t0`] with the given insert count and CPU buckets.
pub fn snap(secs: i64, insert: u64, user: u64, idle: u64) -> CounterSnapshot {
    CounterSnapshot {
        captured_at: t0() + Duration::seconds(secs),
        operations: OperationCounters {
            insert,
            ..OperationCounters::default()
        },
        network: NetworkCounters::default(),
        memory: MemoryGauges::new(),
        connections: ConnectionGauges::default(),
        cpu_times: CpuTimes {
            user,
            idle,
            ..CpuTimes::default()
        },
    }
}

/// A persisted-looking sample with zero readings.
pub fn stored(ts: DateTime<Utc>) -> DerivedSample {
    DerivedSample {
        timestamp: ts,
        reading: MetricsReading::default(),
    }
}
