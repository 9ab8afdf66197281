use std::collections::HashMap;

use chrono::Utc;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{
    ConnectionGauges, CounterSnapshot, CounterSource, MemoryGauges, NetworkCounters,
    OperationCounters, ProcStatReader, ProviderError,
};

// ─── Command classification ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Query,
    Update,
    Delete,
}

const INSERT_CMDS: &[&str] = &[
    "set", "setnx", "setex", "psetex", "mset", "msetnx", "append", "hset", "hsetnx",
    "hmset", "lpush", "rpush", "lpushx", "rpushx", "linsert", "sadd", "zadd", "xadd",
    "pfadd", "geoadd",
];

const QUERY_CMDS: &[&str] = &[
    "get", "mget", "getrange", "strlen", "exists", "type", "ttl", "pttl", "keys",
    "scan", "hget", "hmget", "hgetall", "hkeys", "hvals", "hlen", "hexists", "hscan",
    "lrange", "lindex", "llen", "smembers", "sismember", "smismember", "scard",
    "srandmember", "sscan", "sinter", "sunion", "sdiff", "zrange", "zrangebyscore",
    "zrevrange", "zrevrangebyscore", "zrank", "zrevrank", "zscore", "zcard", "zcount",
    "zscan", "xrange", "xrevrange", "xlen", "xread", "pfcount", "geopos", "geosearch",
];

const UPDATE_CMDS: &[&str] = &[
    "incr", "incrby", "incrbyfloat", "decr", "decrby", "getset", "setrange", "setbit",
    "hincrby", "hincrbyfloat", "lset", "lmove", "rpoplpush", "smove", "zincrby",
    "expire", "pexpire", "expireat", "pexpireat", "persist", "rename", "renamenx",
];

const DELETE_CMDS: &[&str] = &[
    "del", "unlink", "getdel", "hdel", "lpop", "rpop", "blpop", "brpop", "lrem",
    "ltrim", "srem", "spop", "zrem", "zpopmin", "zpopmax", "zremrangebyscore",
    "zremrangebyrank", "xdel", "xtrim", "flushdb", "flushall",
];

/// Map a command name (as it appears after `cmdstat_`) onto an operation kind.
/// Container subcommands like `client|list` are classified by their parent.
pub fn classify(command: &str) -> Option<OpKind> {
    let base = command.split('|').next().unwrap_or(command);
    let base = base.to_ascii_lowercase();
    let base = base.as_str();

    if INSERT_CMDS.contains(&base) {
        Some(OpKind::Insert)
    } else if QUERY_CMDS.contains(&base) {
        Some(OpKind::Query)
    } else if UPDATE_CMDS.contains(&base) {
        Some(OpKind::Update)
    } else if DELETE_CMDS.contains(&base) {
        Some(OpKind::Delete)
    } else {
        None
    }
}

// ─── INFO parsing ────────────────────────────────────────────────

/// Counters extracted from one `INFO all` reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoCounters {
    pub operations: OperationCounters,
    pub network: NetworkCounters,
    pub memory: MemoryGauges,
    pub connected_clients: u64,
    pub maxclients: Option<u64>,
}

/// Split an INFO reply into `field → value`, skipping section headers.
pub fn info_fields(text: &str) -> HashMap<&str, &str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once(':'))
        .collect()
}

/// `calls=21,usec=175,...` → 21
fn cmdstat_calls(value: &str) -> Option<u64> {
    value
        .split(',')
        .find_map(|kv| kv.strip_prefix("calls="))
        .and_then(|n| n.parse().ok())
}

pub fn parse_info(text: &str) -> InfoCounters {
    let fields = info_fields(text);
    let num = |name: &str| -> u64 {
        fields
            .get(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };

    let mut operations = OperationCounters::default();
    for (key, value) in &fields {
        let Some(command) = key.strip_prefix("cmdstat_") else {
            continue;
        };
        let Some(calls) = cmdstat_calls(value) else {
            continue;
        };
        match classify(command) {
            Some(OpKind::Insert) => operations.insert += calls,
            Some(OpKind::Query) => operations.query += calls,
            Some(OpKind::Update) => operations.update += calls,
            Some(OpKind::Delete) => operations.delete += calls,
            None => {}
        }
    }

    let mut memory = MemoryGauges::new();
    memory.insert("used".into(), num("used_memory"));
    memory.insert("resident".into(), num("used_memory_rss"));
    memory.insert("peak".into(), num("used_memory_peak"));

    InfoCounters {
        operations,
        network: NetworkCounters {
            bytes_in: num("total_net_input_bytes"),
            bytes_out: num("total_net_output_bytes"),
            num_requests: num("total_commands_processed"),
        },
        memory,
        connected_clients: num("connected_clients"),
        maxclients: fields.get("maxclients").and_then(|v| v.parse().ok()),
    }
}

// ─── Live source ─────────────────────────────────────────────────

/// Reads database counters from a Redis server and CPU buckets from procfs.
#[derive(Clone)]
pub struct RedisCounterSource {
    conn: ConnectionManager,
    cpu: ProcStatReader,
}

impl RedisCounterSource {
    pub fn new(conn: ConnectionManager, cpu: ProcStatReader) -> Self {
        Self { conn, cpu }
    }

    /// Servers before 7.0 do not list `maxclients` under INFO clients.
    async fn maxclients_from_config(&self) -> Option<u64> {
        let mut conn = self.conn.clone();
        let reply: redis::RedisResult<Vec<String>> = redis::cmd("CONFIG")
            .arg("GET")
            .arg("maxclients")
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(pair) => pair.get(1).and_then(|v| v.parse().ok()),
            Err(e) => {
                debug!(error = %e, "CONFIG GET maxclients unavailable");
                None
            }
        }
    }
}

impl CounterSource for RedisCounterSource {
    async fn read_counters(&self) -> Result<CounterSnapshot, ProviderError> {
        let captured_at = Utc::now();

        let mut conn = self.conn.clone();
        let text: String = redis::cmd("INFO").arg("all").query_async(&mut conn).await?;
        let info = parse_info(&text);

        let maxclients = match info.maxclients {
            Some(n) => Some(n),
            None => self.maxclients_from_config().await,
        };

        let cpu_times = self.cpu.read().await?;

        Ok(CounterSnapshot {
            captured_at,
            operations: info.operations,
            network: info.network,
            memory: info.memory,
            connections: ConnectionGauges {
                current: info.connected_clients,
                available: maxclients
                    .unwrap_or(0)
                    .saturating_sub(info.connected_clients),
            },
            cpu_times,
        })
    }
}
