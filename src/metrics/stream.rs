use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tracing::{error, warn};

use crate::counters::CounterSource;
use crate::handlers::SAMPLING_FAILED;
use crate::history::HistoryStore;
use crate::sampler::Sampler;
use crate::AppState;

/// Readings a slow viewer may fall behind by before it skips ahead.
const FEED_CAPACITY: usize = 16;

/// One tick of the shared stream sampler.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The reading as JSON, the same body `GET /metrics` returns.
    Reading(String),
    Failed,
}

impl FeedEvent {
    fn into_sse(self) -> Event {
        match self {
            Self::Reading(json) => Event::default().data(json),
            Self::Failed => Event::default()
                .event("error")
                .data(serde_json::json!({ "error": SAMPLING_FAILED }).to_string()),
        }
    }
}

/// Spawn the single sampler behind `/metrics/stream`.
///
/// Every tick runs at most one sampling cycle and broadcasts the result,
/// so any number of viewers sees the same reading and the store gets one
/// sample per tick. Ticks with no viewer attached are skipped.
pub fn spawn_feed<S, H>(sampler: Arc<Sampler<S, H>>, every: Duration) -> broadcast::Sender<FeedEvent>
where
    S: CounterSource + 'static,
    H: HistoryStore + 'static,
{
    let (tx, _) = broadcast::channel(FEED_CAPACITY);
    let feed = tx.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // A slow cycle delays the next one instead of bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if feed.receiver_count() == 0 {
                continue;
            }

            let event = match sampler.sample().await {
                Ok(sample) => match serde_json::to_string(&sample.reading) {
                    Ok(json) => FeedEvent::Reading(json),
                    Err(e) => {
                        error!(error = %e, "stream reading did not serialize");
                        FeedEvent::Failed
                    }
                },
                Err(e) => {
                    error!(error = %e, "stream sampling cycle failed");
                    FeedEvent::Failed
                }
            };
            // Fails only when the last viewer left during the cycle.
            let _ = feed.send(event);
        }
    });

    tx
}

// ─── GET /metrics/stream ─────────────────────────────────────────
/// Server-Sent Events endpoint.
/// Subscribes to the shared feed and pushes each reading as JSON. Failed
/// cycles become an `error` event and the stream keeps going.

pub async fn metrics_stream<S, H>(
    State(state): State<Arc<AppState<S, H>>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>
where
    S: CounterSource + 'static,
    H: HistoryStore + 'static,
{
    let stream = BroadcastStream::new(state.feed.subscribe()).filter_map(|msg| match msg {
        Ok(event) => Some(Ok::<_, Infallible>(event.into_sse())),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "stream viewer fell behind");
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
