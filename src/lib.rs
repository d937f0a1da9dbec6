//! Stub API server library.
//!
//! A deterministic stub API server that backs a web application's test
//! harnesses. It serves fixture responses, exposes `POST /_reset` so the
//! unit-test suite can restore baseline state before every test, exposes
//! `GET /stop` for graceful shutdown at suite teardown, and answers a
//! readiness probe external runners use as their startup gate.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use apistub::{ControlClient, StubServer};
//!
//! #[tokio::main]
//! async fn main() -> apistub::Result<()> {
//!     // Starts on an ephemeral port with the built-in fixture scenario
//!     let server = StubServer::start().await?;
//!     server.await_ready(Duration::from_secs(5)).await?;
//!
//!     // Drive the control plane the way a test runner would
//!     let client = ControlClient::new(server.url())?;
//!     let ack = client.reset().await?;
//!     println!("generation: {}", ack.generation);
//!
//!     client.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`ServerState`] - the fixture store: immutable baseline definitions plus
//!   a mutable overlay for stateful scenarios, reset on demand.
//! - [`create_router`] - control endpoints as explicit routes, all fixture
//!   traffic through a fallback dispatcher; errors never cross this boundary.
//! - [`StubServer`] - owns the listener: startup (or reuse of an existing
//!   healthy instance), readiness signaling, and the idempotent bounded
//!   drain-and-close sequence.
//!
//! State is injected at construction time, so independent instances (an e2e
//! tier on one port, a unit tier on another) coexist without interference.
//!
//! # Configuration
//!
//! The binary reads `PORT` (default 3001) and `APISTUB_REUSE_EXISTING`; see
//! [`ServerConfig::from_env`].

mod client;
mod config;
mod error;
mod fixture;
mod handlers;
mod router;
mod server;
mod state;

pub mod cli;

// Re-export core types
pub use client::{ControlClient, HealthStatus, ResetAck, StopAck};
pub use config::{ServerConfig, DEFAULT_PORT, DEFAULT_READINESS_PATH};
pub use error::{Result, StubError};
pub use fixture::{Fixture, Fixtures, PathPattern};
pub use router::{create_router, AppContext, HEALTH_PATH, RESET_PATH, STOP_PATH};
pub use server::{
    InflightTracker, ListenerPhase, ServerGuard, ShutdownHandle, StubServer,
};
pub use state::{ServerState, SharedState, StoredResponse};
