//! Connection options

use livepool_config::TransportOptions;
use livepool_network::negotiate_support;
use std::time::Duration;

/// Options for opening a [`LiveConnection`](crate::LiveConnection)
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Server url (`http`, `https`, `ws` or `wss`)
    pub url: String,

    /// Versions and capability tokens advertised in the handshake
    pub support: Vec<String>,

    /// Transport-level options
    pub transport: TransportOptions,
}

impl ConnectionOptions {
    /// Create options for `url` advertising the plain DDP versions
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            support: negotiate_support(true),
            transport: TransportOptions::default(),
        }
    }

    /// Set the advertised support list
    pub fn with_support(mut self, support: Vec<String>) -> Self {
        self.support = support;
        self
    }

    /// Set transport options
    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Enable auto-reconnect
    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.transport.retry = enabled;
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.transport.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }
}
