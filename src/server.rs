//! Server lifecycle management.
//!
//! [`StubServer`] owns the listening socket: it binds at startup (or defers
//! to an already-healthy instance when reuse is allowed), signals readiness,
//! and performs the drain-and-close sequence exactly once, no matter how many
//! times a stop is requested.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::client::ControlClient;
use crate::config::ServerConfig;
use crate::error::{Result, StubError};
use crate::router::create_router;
use crate::state::{ServerState, SharedState};

/// How long a reuse probe waits for an existing server to answer.
const REUSE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle phases of the listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    /// Accepting connections.
    Bound,
    /// Drain requested; new connections rejected, in-flight allowed to finish.
    Draining,
    /// Listener closed; the serve task has ended.
    Closed,
}

/// Shared trigger for the drain-and-close sequence.
///
/// Cloneable; the first `request` starts the drain, later ones are no-ops.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a drain. Returns `true` if one was already in progress.
    pub fn request(&self) -> bool {
        self.tx.send_replace(true)
    }

    /// Whether a drain has been requested.
    pub fn is_draining(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Registry of requests currently being handled.
///
/// Consulted when a drain times out, so the log can name the requests that
/// blocked it.
#[derive(Debug, Clone, Default)]
pub struct InflightTracker {
    inner: Arc<Mutex<TrackerInner>>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    next_id: u64,
    active: HashMap<u64, String>,
}

impl InflightTracker {
    pub(crate) fn begin(&self, label: String) -> u64 {
        match self.inner.lock() {
            Ok(mut inner) => {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.active.insert(id, label);
                id
            }
            Err(_) => 0,
        }
    }

    pub(crate) fn end(&self, id: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.active.remove(&id);
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| {
                let mut labels: Vec<String> = inner.active.values().cloned().collect();
                labels.sort();
                labels
            })
            .unwrap_or_default()
    }
}

/// Result of [`StubServer::start_or_reuse`].
pub enum ServerGuard {
    /// This process bound the port and owns the listener.
    Owned(StubServer),
    /// A healthy server was already listening; startup was skipped.
    Reused { url: String },
}

impl ServerGuard {
    /// Base URL of the server, owned or reused.
    pub fn url(&self) -> &str {
        match self {
            ServerGuard::Owned(server) => server.url(),
            ServerGuard::Reused { url } => url,
        }
    }

    /// Whether startup was skipped in favour of an existing instance.
    pub fn is_reused(&self) -> bool {
        matches!(self, ServerGuard::Reused { .. })
    }
}

/// A running stub server.
///
/// The server runs in a background task; use [`StubServer::url`] to reach it
/// and [`StubServer::stop`] or the `/stop` endpoint to shut it down.
pub struct StubServer {
    url: String,
    addr: SocketAddr,
    config: ServerConfig,
    state: SharedState,
    shutdown: ShutdownHandle,
    inflight: InflightTracker,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Start a server with the built-in fixture scenario on an ephemeral port.
    pub async fn start() -> Result<Self> {
        Self::with_state(
            ServerConfig::default(),
            ServerState::new().with_fixtures(crate::fixture::Fixtures::default_scenario()),
        )
        .await
    }

    /// Start a server with no fixtures registered.
    ///
    /// Useful when a test wants to control exactly what is served.
    pub async fn start_empty() -> Result<Self> {
        Self::with_state(ServerConfig::default(), ServerState::new()).await
    }

    /// Start a server with explicit config and state.
    pub async fn with_state(config: ServerConfig, state: ServerState) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr())
            .await
            .map_err(|e| bind_error(e, config.port))?;

        Self::serve_on(listener, config, state)
    }

    /// Start a server, or defer to an already-healthy one.
    ///
    /// When the port is taken and the config allows reuse, the existing
    /// instance is probed on the readiness path; if it answers, startup is
    /// skipped and the caller may treat the server as ready. Otherwise the
    /// conflict surfaces as [`StubError::PortInUse`].
    pub async fn start_or_reuse(config: ServerConfig, state: ServerState) -> Result<ServerGuard> {
        match TcpListener::bind(config.bind_addr()).await {
            Ok(listener) => Ok(ServerGuard::Owned(Self::serve_on(listener, config, state)?)),
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                let url = config.base_url();
                if config.reuse_existing {
                    let probe = ControlClient::new(&url)?;
                    if probe
                        .await_ready(&config.readiness_path, REUSE_PROBE_TIMEOUT)
                        .await
                        .is_ok()
                    {
                        info!(%url, "port already bound, reusing healthy server");
                        return Ok(ServerGuard::Reused { url });
                    }
                }
                Err(StubError::PortInUse { port: config.port })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn serve_on(listener: TcpListener, config: ServerConfig, state: ServerState) -> Result<Self> {
        let addr = listener.local_addr()?;
        let shared = state.shared();
        let shutdown = ShutdownHandle::new();
        let inflight = InflightTracker::default();
        let app = create_router(shared.clone(), shutdown.clone(), inflight.clone());

        let mut rx = shutdown.subscribe();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = rx.wait_for(|draining| *draining).await;
        });

        let handle = tokio::spawn(async move {
            if let Err(e) = serve.await {
                error!(error = %e, "server task failed");
            }
        });

        info!(%addr, "stub server listening");

        Ok(Self {
            url: format!("http://{addr}"),
            addr,
            config,
            state: shared,
            shutdown,
            inflight,
            handle,
        })
    }

    /// Base URL of the server.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared handle to the fixture store, for seeding or inspecting state
    /// mid-test.
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Handle that external callers (signal handlers) can use to request a
    /// drain.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Current listener phase.
    pub fn phase(&self) -> ListenerPhase {
        if self.handle.is_finished() {
            ListenerPhase::Closed
        } else if self.shutdown.is_draining() {
            ListenerPhase::Draining
        } else {
            ListenerPhase::Bound
        }
    }

    /// Poll the readiness path until it answers, or time out.
    pub async fn await_ready(&self, timeout: Duration) -> Result<()> {
        ControlClient::new(&self.url)?
            .await_ready(&self.config.readiness_path, timeout)
            .await
    }

    /// Run until a drain is requested (via `/stop` or a signal handler),
    /// then enforce the bounded drain.
    pub async fn wait(self) -> Result<()> {
        let Self {
            mut handle,
            shutdown,
            inflight,
            config,
            ..
        } = self;
        let mut rx = shutdown.subscribe();

        tokio::select! {
            _ = &mut handle => Ok(()),
            _ = rx.wait_for(|draining| *draining) => {
                drain(&mut handle, &inflight, config.drain_timeout).await
            }
        }
    }

    /// Drain and close the listener.
    ///
    /// Idempotent with respect to an HTTP-initiated stop: if the drain is
    /// already done this returns immediately. On timeout the remaining
    /// connections are force-closed and the error names the requests that
    /// were still in flight.
    pub async fn stop(self) -> Result<()> {
        let Self {
            mut handle,
            shutdown,
            inflight,
            config,
            ..
        } = self;

        if handle.is_finished() {
            let _ = handle.await;
            return Ok(());
        }

        shutdown.request();
        drain(&mut handle, &inflight, config.drain_timeout).await
    }
}

async fn drain(
    handle: &mut JoinHandle<()>,
    inflight: &InflightTracker,
    drain_timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(drain_timeout, &mut *handle).await {
        Ok(_) => {
            info!("listener drained and closed");
            Ok(())
        }
        Err(_) => {
            let pending = inflight.snapshot();
            error!(?pending, "drain timed out, force-closing listener");
            handle.abort();
            Err(StubError::DrainTimeout {
                seconds: drain_timeout.as_secs(),
            })
        }
    }
}

fn bind_error(e: std::io::Error, port: u16) -> StubError {
    if e.kind() == ErrorKind::AddrInUse {
        StubError::PortInUse { port }
    } else {
        StubError::Io(e)
    }
}
