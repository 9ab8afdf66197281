use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

mod config;
mod counters;
mod handlers;
mod history;
mod metrics;
mod middleware;
mod redis_client;
mod sampler;
mod server;
#[cfg(test)]
mod test_utils;

use config::{HistoryBackendKind, MonitorConfig};
use counters::{CounterSource, ProcStatReader, RedisCounterSource};
use history::{HistoryBackend, HistoryStore, MemoryHistory, RedisHistory};
use metrics::stream::{self, FeedEvent};
use sampler::Sampler;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
///
/// Generic over the counter source and history store so the router can
/// run against fakes; the binary uses the defaults.
pub struct AppState<S = RedisCounterSource, H = HistoryBackend> {
    /// Sole owner of the rate baseline; serializes sampling cycles.
    pub sampler: Arc<Sampler<S, H>>,

    /// Readings of the shared stream sampler, fanned out to every
    /// `/metrics/stream` viewer.
    pub feed: broadcast::Sender<FeedEvent>,
}

impl<S, H> AppState<S, H>
where
    S: CounterSource + 'static,
    H: HistoryStore + 'static,
{
    /// Wrap the sampler and start the stream feed ticking every `stream_interval`.
    /// Must be called inside a tokio runtime.
    pub fn new(sampler: Sampler<S, H>, stream_interval: Duration) -> Self {
        let sampler = Arc::new(sampler);
        let feed = stream::spawn_feed(sampler.clone(), stream_interval);
        Self { sampler, feed }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    dotenvy::dotenv().ok();
    let config = MonitorConfig::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // ── 1. Connect to the monitored Redis ────────────────────────
    info!(url = %config.redis_url, "connecting to monitored redis");
    let monitored = redis_client::connect(&config.redis_url)
        .await
        .with_context(|| format!("cannot connect to {}", config.redis_url))?;

    // ── 2. History backend ───────────────────────────────────────
    let store = match config.history_backend {
        HistoryBackendKind::Memory => {
            info!("history kept in memory only");
            HistoryBackend::Memory(MemoryHistory::new())
        }
        HistoryBackendKind::Redis => {
            let conn = if config.history_url == config.redis_url {
                monitored.clone()
            } else {
                redis_client::connect(&config.history_url)
                    .await
                    .with_context(|| format!("cannot connect to {}", config.history_url))?
            };
            info!(url = %config.history_url, key = %config.history_key, "history in redis");
            HistoryBackend::Redis(RedisHistory::new(conn, config.history_key.clone()))
        }
    };

    // ── 3. Build shared state ────────────────────────────────────
    let source = RedisCounterSource::new(monitored, ProcStatReader::new(&config.proc_stat));
    let state = Arc::new(AppState::new(
        Sampler::new(source, store),
        config.stream_interval(),
    ));

    // ── 4. Bind & serve ──────────────────────────────────────────
    let app = server::create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "serving /metrics, /metrics/history, /metrics/stream");
    axum::serve(listener, app).await?;
    Ok(())
}
