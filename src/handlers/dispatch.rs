//! Fallback dispatcher for fixture traffic.
//!
//! Every request that is not a control endpoint lands here. Errors never
//! escape this boundary; they are converted to structured HTTP responses.

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::StubError;
use crate::router::AppContext;
use crate::state::StoredResponse;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Dispatch a request to the fixture store.
///
/// Write methods go through `apply_mutation`; everything else resolves
/// through `lookup`. No match anywhere yields a structured 404.
pub async fn dispatch(State(ctx): State<AppContext>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let bytes = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return failure_response(
                &StubError::MalformedRequest(e.to_string()),
                &method,
                &path,
            );
        }
    };

    let is_write = matches!(
        method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );

    let stored = if is_write {
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    return failure_response(
                        &StubError::MalformedRequest(e.to_string()),
                        &method,
                        &path,
                    );
                }
            }
        };
        ctx.state
            .write()
            .await
            .apply_mutation(method.as_str(), &path, body)
    } else {
        ctx.state.read().await.lookup(method.as_str(), &path)
    };

    match stored {
        Some(stored) => {
            debug!(%method, %path, status = stored.status, "served fixture");
            stored_response(stored)
        }
        None => failure_response(
            &StubError::RouteNotFound {
                method: method.as_str().to_string(),
                path: path.clone(),
            },
            &method,
            &path,
        ),
    }
}

/// Build an HTTP response from a resolved fixture.
///
/// Responses are JSON unless the fixture set its own `content-type`, in which
/// case a string body is sent raw.
fn stored_response(stored: StoredResponse) -> Response {
    let status =
        StatusCode::from_u16(stored.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let custom_content_type = stored
        .headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));

    let mut response = if custom_content_type {
        let body = match stored.body {
            Value::String(s) => s,
            other => other.to_string(),
        };
        (status, body).into_response()
    } else {
        (status, Json(stored.body)).into_response()
    };

    for (name, value) in &stored.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid fixture header"),
        }
    }

    response
}

/// Convert a boundary error into its structured HTTP form.
fn failure_response(err: &StubError, method: &Method, path: &str) -> Response {
    let (status, message) = match err {
        StubError::RouteNotFound { .. } => (StatusCode::NOT_FOUND, "unregistered route"),
        StubError::MalformedRequest(_) => (StatusCode::BAD_REQUEST, "malformed request body"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
    };

    warn!(%method, %path, error = %err, "request failed");

    (
        status,
        Json(json!({
            "error": message,
            "detail": err.to_string(),
            "method": method.as_str(),
            "path": path
        })),
    )
        .into_response()
}
