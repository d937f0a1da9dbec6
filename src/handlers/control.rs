//! Control-plane handlers: reset, stop, health.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{debug, info};

use crate::router::AppContext;

/// POST /_reset
///
/// Restores the fixture store to its baseline. The reset completes under the
/// state write lock before the acknowledgement is produced, so a caller that
/// sees the response knows the new state is in effect. Safe to call when
/// nothing was mutated.
pub async fn reset(State(ctx): State<AppContext>) -> impl IntoResponse {
    let generation = ctx.state.write().await.reset();
    info!(generation, "fixture state reset to baseline");

    (
        StatusCode::OK,
        Json(json!({ "reset": true, "generation": generation })),
    )
}

/// GET /stop
///
/// Two explicit phases: the acknowledgement is produced first and rides out
/// as an in-flight response that the drain allows to finish; only then does
/// the listener stop accepting connections and close. A second call while
/// draining returns the same acknowledgement without starting another drain.
pub async fn stop(State(ctx): State<AppContext>) -> impl IntoResponse {
    if ctx.shutdown.request() {
        debug!("stop requested while already draining");
    } else {
        info!("stop requested, draining listener");
    }

    (StatusCode::OK, Json(json!({ "stopping": true })))
}

/// GET /health
///
/// Liveness/readiness answer consumed by external runners and by the
/// `status` CLI command.
pub async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    let generation = ctx.state.read().await.generation();

    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "generation": generation })),
    )
}
