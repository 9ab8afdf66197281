use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Tower-compatible middleware that adds two response headers:
///
///   X-Response-Time-Us: total handler wall time in microseconds
///   Server-Timing: same value in the standard Server-Timing format
///
/// and logs one line per finished request.
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing =
        format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // ── Log ─────────────────────────────────────────────────────
    // The SSE response returns immediately; its duration means nothing.
    if !path.ends_with("/stream") {
        let status = response.status().as_u16();
        if response.status().is_server_error() {
            warn!(%method, %path, status, us = us as u64, "request failed");
        } else {
            info!(%method, %path, status, us = us as u64, "request");
        }
    }

    response
}
