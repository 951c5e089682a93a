//! Connection status

use std::fmt;

/// Coarse connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Opening the transport or waiting for the handshake reply
    Connecting,
    /// Handshake completed
    Connected,
    /// Gave up; the connection will not retry
    Failed,
    /// Waiting before the next reconnect attempt
    Waiting,
    /// Closed locally
    Offline,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusKind::Connecting => "connecting",
            StatusKind::Connected => "connected",
            StatusKind::Failed => "failed",
            StatusKind::Waiting => "waiting",
            StatusKind::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// Snapshot of a connection's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub kind: StatusKind,
    pub connected: bool,
    /// Reconnect attempts since the last successful handshake
    pub retry_count: u32,
    /// Why the connection failed, if it did
    pub reason: Option<String>,
}

impl ConnectionStatus {
    pub(crate) fn connecting() -> Self {
        Self {
            kind: StatusKind::Connecting,
            connected: false,
            retry_count: 0,
            reason: None,
        }
    }

    /// Failed or offline; such a connection never comes back
    pub fn is_dead(&self) -> bool {
        matches!(self.kind, StatusKind::Failed | StatusKind::Offline)
    }
}
