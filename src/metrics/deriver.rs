use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::counters::{
    ConnectionGauges, CounterSnapshot, CpuTimes, MemoryGauges,
};

// ─── Public types ────────────────────────────────────────────────

/// Database operations per second over the last interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationRates {
    pub insert: f64,
    pub query: f64,
    pub update: f64,
    pub delete: f64,
}

/// Network throughput over the last interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRates {
    pub bytes_in: f64,
    pub bytes_out: f64,
    pub num_requests: f64,
}

/// Share of elapsed host CPU time per bucket, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
    pub usage_percent: f64,
}

/// Everything reported for one interval, minus the timestamp.
/// This is the body of the live `/metrics` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReading {
    pub operations: OperationRates,
    pub network: NetworkRates,
    pub memory: MemoryGauges,
    pub cpu: CpuUsage,
    pub connections: ConnectionGauges,
}

/// A reading stamped with the capture time of the later snapshot.
/// This is the document persisted to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSample {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub reading: MetricsReading,
}

/// Turns consecutive counter snapshots into per-second rates.
///
/// Holds exactly one baseline snapshot. Every call to [`derive`]
/// replaces it, so callers must not interleave sampling cycles for the
/// same target; see `Sampler` for how the service serializes them.
///
/// [`derive`]: RateDeriver::derive
pub struct RateDeriver {
    inner: Mutex<Inner>,
}

struct Inner {
    prior: Option<CounterSnapshot>,
}

// ─── RateDeriver impl ────────────────────────────────────────────

impl RateDeriver {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { prior: None }),
        }
    }

    /// Derive the sample for the interval ending at `current`.
    ///
    /// The first call only primes the baseline and returns zero rates
    /// with gauges copied from `current`.
    pub fn derive(&self, current: CounterSnapshot) -> DerivedSample {
        self.inner.lock().derive(current)
    }

    /// The snapshot the next interval will be measured from.
    #[cfg(test)]
    pub fn baseline(&self) -> Option<CounterSnapshot> {
        self.inner.lock().prior.clone()
    }

    pub fn is_primed(&self) -> bool {
        self.inner.lock().prior.is_some()
    }
}

impl Default for RateDeriver {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn derive(&mut self, current: CounterSnapshot) -> DerivedSample {
        let sample = match &self.prior {
            None => baseline_sample(&current),
            Some(prior) => sample_between(prior, &current),
        };
        // Advance unconditionally, whatever happens to the sample next.
        self.prior = Some(current);
        sample
    }
}

fn baseline_sample(current: &CounterSnapshot) -> DerivedSample {
    DerivedSample {
        timestamp: current.captured_at,
        reading: MetricsReading {
            memory: current.memory.clone(),
            connections: current.connections,
            ..MetricsReading::default()
        },
    }
}

fn sample_between(prior: &CounterSnapshot, current: &CounterSnapshot) -> DerivedSample {
    let elapsed = elapsed_secs(prior.captured_at, current.captured_at);
    if elapsed < 0.0 {
        warn!(elapsed, "capture clock went backwards; rates will be negative");
    }

    let (p, c) = (&prior.operations, &current.operations);
    let operations = OperationRates {
        insert: per_sec("insert", p.insert, c.insert, elapsed),
        query: per_sec("query", p.query, c.query, elapsed),
        update: per_sec("update", p.update, c.update, elapsed),
        delete: per_sec("delete", p.delete, c.delete, elapsed),
    };

    let (p, c) = (&prior.network, &current.network);
    let network = NetworkRates {
        bytes_in: per_sec("bytesIn", p.bytes_in, c.bytes_in, elapsed),
        bytes_out: per_sec("bytesOut", p.bytes_out, c.bytes_out, elapsed),
        num_requests: per_sec("numRequests", p.num_requests, c.num_requests, elapsed),
    };

    DerivedSample {
        timestamp: current.captured_at,
        reading: MetricsReading {
            operations,
            network,
            memory: current.memory.clone(),
            cpu: cpu_usage(&prior.cpu_times, &current.cpu_times),
            connections: current.connections,
        },
    }
}

// ─── Arithmetic ──────────────────────────────────────────────────

fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Average rate of a cumulative counter. A counter that went down
/// (server restart) is logged and reported as the negative rate it is.
fn per_sec(name: &str, prior: u64, current: u64, elapsed: f64) -> f64 {
    if current < prior {
        warn!(counter = name, prior, current, "cumulative counter decreased");
    }
    finite_or_zero((current as f64 - prior as f64) / elapsed)
}

/// Split the CPU time elapsed between two reads into per-bucket shares.
pub fn cpu_usage(prior: &CpuTimes, current: &CpuTimes) -> CpuUsage {
    let total_delta = current.total() as f64 - prior.total() as f64;
    let idle_delta = current.idle as f64 - prior.idle as f64;
    let share = |d: f64| finite_or_zero(100.0 * d / total_delta);

    let usage_percent = if total_delta > 0.0 {
        round2(100.0 * (total_delta - idle_delta) / total_delta)
    } else {
        0.0
    };

    CpuUsage {
        user: share(current.user as f64 - prior.user as f64),
        system: share(current.system as f64 - prior.system as f64),
        idle: share(idle_delta),
        usage_percent,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{NetworkCounters, OperationCounters};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(at: DateTime<Utc>, insert: u64) -> CounterSnapshot {
        let mut memory = MemoryGauges::new();
        memory.insert("resident".into(), 4096);
        CounterSnapshot {
            captured_at: at,
            operations: OperationCounters {
                insert,
                ..OperationCounters::default()
            },
            network: NetworkCounters::default(),
            memory,
            connections: ConnectionGauges {
                current: 5,
                available: 995,
            },
            cpu_times: CpuTimes::default(),
        }
    }

    #[test]
    fn first_call_is_a_zero_baseline() {
        let deriver = RateDeriver::new();
        let mut snap = snapshot(t0(), 1_000_000);
        snap.network = NetworkCounters {
            bytes_in: 9,
            bytes_out: 9,
            num_requests: 9,
        };
        snap.cpu_times = CpuTimes {
            user: 50,
            nice: 1,
            system: 20,
            idle: 400,
            irq: 2,
        };

        let sample = deriver.derive(snap.clone());

        assert_eq!(sample.timestamp, t0());
        assert_eq!(sample.reading.operations, OperationRates::default());
        assert_eq!(sample.reading.network, NetworkRates::default());
        assert_eq!(sample.reading.cpu, CpuUsage::default());
        assert_eq!(sample.reading.memory, snap.memory);
        assert_eq!(sample.reading.connections, snap.connections);
        assert!(deriver.is_primed());
    }

    #[test]
    fn rate_over_two_seconds() {
        let deriver = RateDeriver::new();
        deriver.derive(snapshot(t0(), 100));
        let sample = deriver.derive(snapshot(t0() + Duration::seconds(2), 110));
        assert_eq!(sample.reading.operations.insert, 5.0);
    }

    #[test]
    fn rate_over_three_seconds() {
        let deriver = RateDeriver::new();
        deriver.derive(snapshot(t0(), 100));
        let later = t0() + Duration::seconds(3);
        let sample = deriver.derive(snapshot(later, 130));
        assert_eq!(sample.reading.operations.insert, 10.0);
        assert_eq!(sample.timestamp, later);
    }

    #[test]
    fn irregular_intervals() {
        let deriver = RateDeriver::new();
        deriver.derive(snapshot(t0(), 0));
        let s1 = deriver.derive(snapshot(t0() + Duration::milliseconds(500), 50));
        let s2 = deriver.derive(snapshot(t0() + Duration::milliseconds(10_500), 150));
        assert_eq!(s1.reading.operations.insert, 100.0);
        assert_eq!(s2.reading.operations.insert, 10.0);
    }

    #[test]
    fn network_rates_use_every_key() {
        let deriver = RateDeriver::new();
        let mut a = snapshot(t0(), 0);
        a.network = NetworkCounters {
            bytes_in: 1_000,
            bytes_out: 2_000,
            num_requests: 10,
        };
        let mut b = snapshot(t0() + Duration::seconds(4), 0);
        b.network = NetworkCounters {
            bytes_in: 5_000,
            bytes_out: 2_400,
            num_requests: 30,
        };
        deriver.derive(a);
        let s = deriver.derive(b);
        assert_eq!(
            s.reading.network,
            NetworkRates {
                bytes_in: 1_000.0,
                bytes_out: 100.0,
                num_requests: 5.0,
            }
        );
    }

    #[test]
    fn counter_rollback_passes_through_negative() {
        let deriver = RateDeriver::new();
        deriver.derive(snapshot(t0(), 500));
        let s = deriver.derive(snapshot(t0() + Duration::seconds(5), 0));
        assert_eq!(s.reading.operations.insert, -100.0);
    }

    #[test]
    fn same_instant_yields_zero_not_nan() {
        let deriver = RateDeriver::new();
        deriver.derive(snapshot(t0(), 1));
        let s = deriver.derive(snapshot(t0(), 9));
        assert_eq!(s.reading.operations.insert, 0.0);
    }

    #[test]
    fn gauges_come_from_later_snapshot() {
        let deriver = RateDeriver::new();
        deriver.derive(snapshot(t0(), 0));
        let mut later = snapshot(t0() + Duration::seconds(1), 0);
        later.memory.insert("resident".into(), 8192);
        later.connections.current = 42;
        let s = deriver.derive(later);
        assert_eq!(s.reading.memory["resident"], 8192);
        assert_eq!(s.reading.connections.current, 42);
    }

    #[test]
    fn baseline_tracks_last_input() {
        let deriver = RateDeriver::new();
        assert!(deriver.baseline().is_none());

        let inputs: Vec<_> = (0..5)
            .map(|i| snapshot(t0() + Duration::seconds(i), 10 * i as u64))
            .collect();
        for snap in &inputs {
            deriver.derive(snap.clone());
        }
        assert_eq!(deriver.baseline().as_ref(), inputs.last());
    }

    #[test]
    fn cpu_split() {
        let prior = CpuTimes {
            user: 100,
            nice: 0,
            system: 50,
            idle: 800,
            irq: 50,
        };
        let current = CpuTimes {
            user: 130,
            nice: 10,
            system: 60,
            idle: 850,
            irq: 50,
        };
        // total delta 100: user 30, nice 10, system 10, idle 50
        let cpu = cpu_usage(&prior, &current);
        assert_eq!(cpu.user, 30.0);
        assert_eq!(cpu.system, 10.0);
        assert_eq!(cpu.idle, 50.0);
        assert_eq!(cpu.usage_percent, 50.0);
    }

    #[test]
    fn usage_percent_is_rounded() {
        let prior = CpuTimes::default();
        let current = CpuTimes {
            user: 1,
            idle: 2,
            ..CpuTimes::default()
        };
        let cpu = cpu_usage(&prior, &current);
        assert_eq!(cpu.usage_percent, 33.33);
        assert!((cpu.user - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn frozen_cpu_is_all_zero() {
        let times = CpuTimes {
            user: 10,
            nice: 1,
            system: 5,
            idle: 100,
            irq: 0,
        };
        assert_eq!(cpu_usage(&times, &times), CpuUsage::default());

        // Buckets moved but cancelled out in the total.
        let shifted = CpuTimes {
            user: 20,
            idle: 90,
            ..times
        };
        let cpu = cpu_usage(&times, &shifted);
        assert_eq!(cpu, CpuUsage::default());
        assert!(!cpu.user.is_nan());
    }

    #[test]
    fn live_body_has_no_timestamp() {
        let value = serde_json::to_value(MetricsReading::default()).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["connections", "cpu", "memory", "network", "operations"]);
        assert!(obj["cpu"].get("usagePercent").is_some());
        assert!(obj["network"].get("bytesIn").is_some());
    }

    #[test]
    fn persisted_document_is_flat() {
        let sample = DerivedSample {
            timestamp: t0(),
            reading: MetricsReading::default(),
        };
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["timestamp"], "2026-03-01T12:00:00Z");
        assert!(value.get("operations").is_some());

        let back: DerivedSample = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample);
    }
}
