//! # LivePool Client
//!
//! Live DDP connection handle used by the LivePool connection pool.
//!
//! ## Features
//!
//! - Handshake with capability negotiation
//! - Method calls and subscriptions with id correlation
//! - Client-side document mirror per collection
//! - Heartbeat replies and optional auto-reconnect
//! - Ordered close hooks and a reconnect hook
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livepool_client::{ConnectionOptions, LiveConnection};
//! use livepool_network::WebSocketConnector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ConnectionOptions::new("http://localhost:3000/");
//!     let connection = LiveConnection::open(Arc::new(WebSocketConnector::new()), options)?;
//!     connection.wait_connected().await?;
//!
//!     connection.subscribe("fruits", vec![]).await?;
//!     if let Some(fruits) = connection.collection("fruits") {
//!         println!("{} fruits", fruits.len());
//!     }
//!
//!     connection.close();
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod login;
pub mod status;

// Re-export main types
pub use crate::collection::Collection;
pub use crate::config::ConnectionOptions;
pub use crate::connection::LiveConnection;
pub use crate::error::{ClientError, Result};
pub use crate::login::{LoginRequest, LoginResult, LoginStatus};
pub use crate::status::{ConnectionStatus, StatusKind};

// Prelude module for common imports
pub mod prelude {
    pub use crate::config::ConnectionOptions;
    pub use crate::connection::LiveConnection;
    pub use crate::error::{ClientError, Result};
    pub use crate::login::{LoginRequest, LoginStatus};
    pub use crate::status::{ConnectionStatus, StatusKind};
}
