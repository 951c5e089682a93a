//! # LivePool - DDP 连接池与会话恢复管理器
//!
//! LivePool 在有状态的 DDP 实时数据协议前维护一组长连接，
//! 让断开的客户端可以恢复它之前使用的后端连接（包括已完成的登录），
//! 并按过期时间回收被遗弃的连接。
//!
//! ## 特性
//!
//! - 创建连接时协商能力，代理连接声明 `ddpproxy`
//! - 异步登录，登录结果记录在连接上
//! - 按地址、会话键和恢复凭证恢复已有连接
//! - 周期性过期清理
//! - 内存或文件记录存储
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use livepool::{ConfigUpdate, ConnectOptions, ConnectionPool, LoginRequest, PoolOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> livepool::Result<()> {
//!     let pool = ConnectionPool::with_options(
//!         PoolOptions::new().update(ConfigUpdate::new().url("http://localhost:3000/")),
//!     );
//!
//!     let login = LoginRequest::new().with("user", json!({"email": "test@test.com"}));
//!     let connection = pool
//!         .connect(ConnectOptions::new().session_key("tab-1").login(login))
//!         .await?;
//!
//!     if let Some(connection) = connection {
//!         println!("login: {:?}", connection.login_status());
//!     }
//!
//!     pool.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! ## 模块组织
//!
//! - `livepool_config` - 连接池配置
//! - `livepool_core` - 错误类型、连接记录与记录存储
//! - `livepool_network` - DDP 消息、能力协商与传输
//! - `livepool_client` - 单条实时连接
//! - [`pool`] - 连接池与过期清理

pub mod pool;

pub use crate::pool::{ConnectOptions, ConnectionPool, PoolBuilder, PoolOptions, SessionValidator};

// ============================================================================
// Crate Re-exports (for advanced users)
// ============================================================================

pub use livepool_client;
pub use livepool_config;
pub use livepool_core;
pub use livepool_network;

pub use livepool_client::{ConnectionStatus, LiveConnection, LoginRequest, LoginResult, LoginStatus, StatusKind};
pub use livepool_config::{ConfigUpdate, PoolConfig, TransportOptions};
pub use livepool_core::{FileRecordStore, MemoryRecordStore, PoolErrorKind, RecordId, RecordStore};

// ============================================================================
// Prelude Module
// ============================================================================

/// 预导出常用类型
///
/// 通过 `use livepool::prelude::*;` 导入所有常用类型
pub mod prelude {
    pub use crate::pool::{ConnectOptions, ConnectionPool, PoolOptions};
    pub use livepool_client::{LiveConnection, LoginRequest, LoginStatus};
    pub use livepool_config::{ConfigUpdate, PoolConfig};
    pub use livepool_core::{RecordFilter, RecordStore};
}

// ============================================================================
// Error Types
// ============================================================================

/// LivePool 统一 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

/// LivePool 统一错误枚举
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 核心错误
    #[error(transparent)]
    Core(#[from] livepool_core::PoolError),

    /// 连接错误
    #[error(transparent)]
    Client(#[from] livepool_client::ClientError),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] livepool_config::ConfigError),

    /// IO 错误
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 错误分类
    pub fn kind(&self) -> PoolErrorKind {
        match self {
            Error::Core(err) => err.kind(),
            Error::Client(err) => livepool_core::PoolError::from(err.clone()).kind(),
            Error::Config(_) => PoolErrorKind::Config,
            Error::Io(_) => PoolErrorKind::Io,
        }
    }
}

// ============================================================================
// Version Information
// ============================================================================

/// LivePool 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// LivePool 包名
pub const NAME: &str = env!("CARGO_PKG_NAME");
