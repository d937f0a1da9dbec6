//! Server configuration.
//!
//! Defaults suit in-process test use (ephemeral port, loopback). Deployments
//! configure through the environment: `PORT` selects the bound port (3001 for
//! the e2e tier by convention, 3002 for the unit tier) and
//! `APISTUB_REUSE_EXISTING` lets a runner adopt an already-healthy instance.

use std::env;
use std::time::Duration;

/// Port used when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 3001;

/// Readiness-probe target; the constraints fixture of the built-in scenario.
pub const DEFAULT_READINESS_PATH: &str = "/api/leagues-management/constraints";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_DRAIN_SECS: u64 = 5;

/// Configuration for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,

    /// Treat an already-listening healthy server as ready instead of failing
    /// with a port conflict.
    pub reuse_existing: bool,

    /// How long in-flight requests may take to finish during shutdown before
    /// the listener is force-closed.
    pub drain_timeout: Duration,

    /// Path polled by readiness probes.
    pub readiness_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            reuse_existing: false,
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_SECS),
            readiness_path: DEFAULT_READINESS_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the environment.
    ///
    /// `PORT` (default 3001) and `APISTUB_REUSE_EXISTING` (`1` or `true`).
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let reuse_existing = env::var("APISTUB_REUSE_EXISTING")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            port,
            reuse_existing,
            ..Self::default()
        }
    }

    /// Set the bind host.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the bind port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Allow adopting an already-healthy instance on a busy port.
    pub fn with_reuse_existing(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    /// Set the drain timeout.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the readiness-probe path.
    pub fn with_readiness_path(mut self, path: &str) -> Self {
        self.readiness_path = path.to_string();
        self
    }

    /// Address passed to the listener bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL clients use to reach this instance.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_loopback_ephemeral() {
        let config = ServerConfig::default();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert!(!config.reuse_existing);
        assert_eq!(config.readiness_path, DEFAULT_READINESS_PATH);
    }

    #[test]
    fn test_builder_setters() {
        let config = ServerConfig::default()
            .with_host("0.0.0.0")
            .with_port(3002)
            .with_reuse_existing(true)
            .with_drain_timeout(Duration::from_secs(10))
            .with_readiness_path("/health");

        assert_eq!(config.bind_addr(), "0.0.0.0:3002");
        assert_eq!(config.base_url(), "http://0.0.0.0:3002");
        assert!(config.reuse_existing);
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
        assert_eq!(config.readiness_path, "/health");
    }
}
