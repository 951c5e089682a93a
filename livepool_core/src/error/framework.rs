//! 连接池核心错误类型
//!
//! 定义所有连接池级别的错误类型。

use super::context::ErrorContext;
use livepool_config::ConfigError;
use std::io;
use thiserror::Error;

/// 连接池核心错误类型
#[derive(Error, Debug)]
pub enum PoolError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 无效的连接地址
    #[error("无效的地址: {0}")]
    InvalidUrl(String),

    /// 在配置的时间内未能建立连接
    #[error("连接超时")]
    ConnectionTimeout,

    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 协议错误
    #[error("协议错误: {0}")]
    Protocol(String),

    /// 序列化/反序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 连接错误
    #[error("连接错误: {0}")]
    Connection(String),

    /// 记录存储错误
    #[error("记录存储错误: {0}")]
    Store(String),

    /// 连接已关闭
    #[error("连接已关闭")]
    Closed,

    /// 带上下文的错误
    #[error("{0} ({1})")]
    WithContext(#[source] Box<PoolError>, ErrorContext),
}

impl PoolError {
    /// 获取错误类型
    pub fn kind(&self) -> PoolErrorKind {
        match self {
            PoolError::Io(_) => PoolErrorKind::Io,
            PoolError::Config(_) => PoolErrorKind::Config,
            PoolError::InvalidUrl(_) => PoolErrorKind::InvalidUrl,
            PoolError::ConnectionTimeout => PoolErrorKind::ConnectionTimeout,
            PoolError::Network(_) => PoolErrorKind::Network,
            PoolError::Protocol(_) => PoolErrorKind::Protocol,
            PoolError::Serialization(_) => PoolErrorKind::Serialization,
            PoolError::Connection(_) => PoolErrorKind::Connection,
            PoolError::Store(_) => PoolErrorKind::Store,
            PoolError::Closed => PoolErrorKind::Closed,
            PoolError::WithContext(inner, _) => inner.kind(),
        }
    }

    /// 添加上下文信息
    pub fn with_context<C>(self, context: C) -> Self
    where
        C: Into<ErrorContext>,
    {
        PoolError::WithContext(Box::new(self), context.into())
    }

    /// 创建地址错误
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        PoolError::InvalidUrl(msg.into())
    }

    /// 创建网络错误
    pub fn network(msg: impl Into<String>) -> Self {
        PoolError::Network(msg.into())
    }

    /// 创建协议错误
    pub fn protocol(msg: impl Into<String>) -> Self {
        PoolError::Protocol(msg.into())
    }

    /// 创建连接错误
    pub fn connection(msg: impl Into<String>) -> Self {
        PoolError::Connection(msg.into())
    }

    /// 创建存储错误
    pub fn store(msg: impl Into<String>) -> Self {
        PoolError::Store(msg.into())
    }
}

impl From<ConfigError> for PoolError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => PoolError::Io(e),
            other => PoolError::Config(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(err: serde_json::Error) -> Self {
        PoolError::Serialization(err.to_string())
    }
}

/// 错误类型分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolErrorKind {
    /// IO 错误
    Io,
    /// 配置错误
    Config,
    /// 无效地址
    InvalidUrl,
    /// 连接超时
    ConnectionTimeout,
    /// 网络错误
    Network,
    /// 协议错误
    Protocol,
    /// 序列化错误
    Serialization,
    /// 连接错误
    Connection,
    /// 存储错误
    Store,
    /// 已关闭
    Closed,
}
