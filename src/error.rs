//! Error types for the stub server.

use thiserror::Error;

/// Errors that can occur while running or driving the stub server.
#[derive(Debug, Error)]
pub enum StubError {
    /// The requested port is already bound and no reusable server answered.
    #[error("port {port} is already in use and no healthy server answered the readiness probe")]
    PortInUse { port: u16 },

    /// No fixture matched the request. Converted to a 404 at the router
    /// boundary, never propagated past it.
    #[error("no fixture registered for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// In-flight requests did not finish within the drain window.
    #[error("drain did not complete within {seconds}s, forcing close")]
    DrainTimeout { seconds: u64 },

    /// The request body could not be parsed. Converted to a 400.
    #[error("malformed request body: {0}")]
    MalformedRequest(String),

    /// The server never answered its readiness probe.
    #[error("server did not become ready within {seconds}s")]
    ReadyTimeout { seconds: u64 },

    /// A control-plane request returned a non-success status.
    #[error("control request failed: {message}")]
    Control {
        message: String,
        status: Option<u16>,
    },

    /// A fixture file could not be read or parsed.
    #[error("fixture file '{path}': {message}")]
    FixtureFile { path: String, message: String },

    /// I/O error (binding, reading fixture files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error from the control client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for stub-server operations.
pub type Result<T> = core::result::Result<T, StubError>;
