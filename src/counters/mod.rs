pub mod cpu;
pub mod redis_info;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cpu::ProcStatReader;
pub use redis_info::RedisCounterSource;

// ─── Cumulative counters ─────────────────────────────────────────

/// Database operations since server start, bucketed by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounters {
    pub insert: u64,
    pub query: u64,
    pub update: u64,
    pub delete: u64,
}

/// Network traffic since server start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCounters {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub num_requests: u64,
}

/// Host CPU time buckets summed over every processing unit.
/// Units are whatever the host reports (clock ticks on Linux).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub irq: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.irq
    }
}

// ─── Gauges ──────────────────────────────────────────────────────

/// Client connection gauges, copied verbatim into every sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionGauges {
    pub current: u64,
    pub available: u64,
}

/// Memory gauges keyed by metric name (bytes).
pub type MemoryGauges = BTreeMap<String, u64>;

// ─── Snapshot ────────────────────────────────────────────────────

/// One instantaneous read of every counter the monitor tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    pub captured_at: DateTime<Utc>,
    pub operations: OperationCounters,
    pub network: NetworkCounters,
    pub memory: MemoryGauges,
    pub connections: ConnectionGauges,
    pub cpu_times: CpuTimes,
}

// ─── Provider seam ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("redis counter read failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cannot read {path:?}: {source}")]
    ProcStat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no aggregate cpu line in {path:?}")]
    MalformedProcStat { path: PathBuf },
}

/// Anything that can hand out a fresh [`CounterSnapshot`].
///
/// Reads must be side-effect free: calling this twice in a row only
/// moves the counters by whatever the monitored system did meanwhile.
pub trait CounterSource: Send + Sync {
    fn read_counters(
        &self,
    ) -> impl Future<Output = Result<CounterSnapshot, ProviderError>> + Send;
}
