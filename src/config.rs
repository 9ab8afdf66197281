use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

/// Where derived samples are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackendKind {
    Redis,
    Memory,
}

impl HistoryBackendKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub bind_addr: String,
    /// Redis server being monitored.
    pub redis_url: String,
    pub history_backend: HistoryBackendKind,
    /// Redis holding the history sorted set; defaults to `redis_url`.
    pub history_url: String,
    pub history_key: String,
    pub proc_stat: PathBuf,
    pub stream_interval_ms: u64,
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            history_backend: HistoryBackendKind::Redis,
            history_url: "redis://127.0.0.1:6379/".to_string(),
            history_key: "monitoring:metrics".to_string(),
            proc_stat: PathBuf::from("/proc/stat"),
            stream_interval_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unparsable values keep their default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = get("MONITOR_BIND_ADDR") {
            config.bind_addr = val;
        }

        if let Some(val) = get("MONITOR_REDIS_URL") {
            config.redis_url = val;
        }

        config.history_url = get("MONITOR_HISTORY_URL").unwrap_or_else(|| config.redis_url.clone());

        if let Some(kind) = get("MONITOR_HISTORY_BACKEND")
            .as_deref()
            .and_then(HistoryBackendKind::parse)
        {
            config.history_backend = kind;
        }

        if let Some(val) = get("MONITOR_HISTORY_KEY") {
            config.history_key = val;
        }

        if let Some(val) = get("MONITOR_PROC_STAT") {
            config.proc_stat = PathBuf::from(val);
        }

        if let Some(val) = get("MONITOR_STREAM_INTERVAL_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.stream_interval_ms = ms,
                _ => {}
            }
        }

        if let Some(val) = get("MONITOR_LOG_LEVEL") {
            config.log_level = val;
        }

        config
    }

    pub fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}
