use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;
use tracing::debug;

use crate::counters::CounterSource;
use crate::history::{HistoryStore, Lookback};
use crate::metrics::{DerivedSample, MetricsReading};
use crate::AppState;

use super::AppError;

/// First `hours` value of the raw query pairs. Repeats and garbage must
/// not fail extraction, so the pairs are taken as plain strings.
fn hours_param(pairs: &[(String, String)]) -> Option<&str> {
    pairs
        .iter()
        .find(|(key, _)| key == "hours")
        .map(|(_, value)| value.as_str())
}

// ─── GET /metrics ────────────────────────────────────────────────

pub async fn get_metrics<S, H>(
    State(state): State<Arc<AppState<S, H>>>,
) -> Result<Json<MetricsReading>, AppError>
where
    S: CounterSource + 'static,
    H: HistoryStore + 'static,
{
    let sample = state.sampler.sample().await?;
    Ok(Json(sample.reading))
}

// ─── GET /metrics/history?hours=N ────────────────────────────────

pub async fn get_history<S, H>(
    State(state): State<Arc<AppState<S, H>>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<DerivedSample>>, AppError>
where
    S: CounterSource + 'static,
    H: HistoryStore + 'static,
{
    let lookback = Lookback::parse(hours_param(&pairs));
    let samples = state.sampler.history(lookback).await?;
    debug!(hours = lookback.hours(), count = samples.len(), "history served");
    Ok(Json(samples))
}
