use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::counters::CounterSource;
use crate::handlers;
use crate::history::HistoryStore;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router<S, H>(state: Arc<AppState<S, H>>) -> Router
where
    S: CounterSource + 'static,
    H: HistoryStore + 'static,
{
    Router::new()
        // ── Sampling ────────────────────────────────────────────
        .route("/metrics", get(handlers::metrics::get_metrics::<S, H>))
        .route("/metrics/stream", get(stream::metrics_stream::<S, H>))
        // ── History ─────────────────────────────────────────────
        .route("/metrics/history", get(handlers::metrics::get_history::<S, H>))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(CorsLayer::permissive())
}
