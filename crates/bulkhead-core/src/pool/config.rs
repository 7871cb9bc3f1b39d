//! Connection pool configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the pooled HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolConfig {
    /// Maximum total connections the pool may keep
    pub max_connections: usize,

    /// Maximum idle keep-alive connections retained per host
    pub max_keepalive_connections: usize,

    /// How long an idle keep-alive connection is retained
    #[serde(with = "humantime_serde")]
    pub keepalive_expiry: Duration,

    /// Timeout for establishing a new connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout for one full request/response cycle
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Speak HTTP/2 from the first byte (multiplexed transport)
    pub http2: bool,

    /// Interval between background health checks
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_keepalive_connections: 20,
            keepalive_expiry: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            http2: false,
            health_check_interval: Duration::from_secs(30),
        }
    }
}

impl ConnectionPoolConfig {
    /// Create a configuration with the default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum total connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum idle keep-alive connections per host
    pub fn with_max_keepalive_connections(mut self, max: usize) -> Self {
        self.max_keepalive_connections = max;
        self
    }

    /// Set the keep-alive expiry
    pub fn with_keepalive_expiry(mut self, expiry: Duration) -> Self {
        self.keepalive_expiry = expiry;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable HTTP/2 prior knowledge
    pub fn with_http2(mut self, http2: bool) -> Self {
        self.http2 = http2;
        self
    }

    /// Set the health check interval
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// The idle pool size handed to the HTTP client: keep-alive connections,
    /// never above the total connection cap
    pub(crate) fn idle_per_host(&self) -> usize {
        self.max_keepalive_connections.min(self.max_connections)
    }
}
