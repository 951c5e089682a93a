//! Client-specific error types

use livepool_core::PoolError;
use livepool_network::MethodError;
use thiserror::Error;

/// Client-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected to server
    #[error("Not connected")]
    NotConnected,

    /// Connection was closed locally
    #[error("Connection closed")]
    Closed,

    /// Transport dropped while the request was in flight
    #[error("Disconnected before a reply was received")]
    Disconnected,

    /// Send operation failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Server rejected a method call
    #[error("Method failed: {0}")]
    Method(MethodError),

    /// Server refused or stopped a subscription
    #[error("Subscription failed: {0}")]
    Subscription(String),

    /// Login succeeded without producing a token
    #[error("No token was generated")]
    NoToken,
}

impl From<ClientError> for PoolError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::ConnectionFailed(msg) => PoolError::connection(msg),
            ClientError::NotConnected => PoolError::connection("Not connected"),
            ClientError::Closed => PoolError::Closed,
            ClientError::Disconnected => PoolError::network("Disconnected"),
            ClientError::SendFailed(msg) => PoolError::network(msg),
            ClientError::Method(e) => PoolError::protocol(e.to_string()),
            ClientError::Subscription(msg) => PoolError::protocol(msg),
            ClientError::NoToken => PoolError::protocol("No token was generated"),
        }
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
