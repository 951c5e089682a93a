//! 连接池统一错误处理
//!
//! 提供核心错误类型定义和上下文信息。

pub mod context;
pub mod framework;

// 重新导出主要类型
pub use context::ErrorContext;
pub use framework::{PoolError, PoolErrorKind};

/// 连接池统一 Result 类型
pub type Result<T> = std::result::Result<T, PoolError>;
