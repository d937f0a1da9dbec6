//! Request routing.
//!
//! Control endpoints are explicit routes checked before anything else; all
//! fixture traffic funnels through the fallback dispatcher. The state and
//! shutdown handles are injected at construction time, never held as module
//! globals, so independent servers can coexist in one process.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::server::{InflightTracker, ShutdownHandle};
use crate::state::SharedState;

/// Path of the state-reset control endpoint.
pub const RESET_PATH: &str = "/_reset";

/// Path of the graceful-shutdown control endpoint.
pub const STOP_PATH: &str = "/stop";

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Everything the handlers need, injected at router construction.
#[derive(Clone)]
pub struct AppContext {
    pub(crate) state: SharedState,
    pub(crate) shutdown: ShutdownHandle,
    pub(crate) inflight: InflightTracker,
}

/// Build the router for one server instance.
pub fn create_router(
    state: SharedState,
    shutdown: ShutdownHandle,
    inflight: InflightTracker,
) -> Router {
    let ctx = AppContext {
        state,
        shutdown,
        inflight,
    };

    Router::new()
        .route(RESET_PATH, post(handlers::reset))
        .route(STOP_PATH, get(handlers::stop))
        .route(HEALTH_PATH, get(handlers::health))
        .fallback(handlers::dispatch)
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            track_inflight,
        ))
        .with_state(ctx)
}

/// Record every request while it is in flight so a blocked drain can name
/// the requests that held it up.
async fn track_inflight(State(ctx): State<AppContext>, req: Request, next: Next) -> Response {
    let label = format!("{} {}", req.method(), req.uri().path());
    let id = ctx.inflight.begin(label);
    let response = next.run(req).await;
    ctx.inflight.end(id);
    response
}
