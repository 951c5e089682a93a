//! 错误上下文
//!
//! 为错误提供额外的上下文信息。

use crate::record::RecordId;
use std::fmt;

/// 错误上下文信息
#[derive(Debug, Clone)]
pub enum ErrorContext {
    /// 键值对上下文
    KeyValue(String, String),
    /// 自定义上下文
    Custom(String),
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorContext::KeyValue(key, value) => write!(f, "{}: {}", key, value),
            ErrorContext::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<(&str, &str)> for ErrorContext {
    fn from((key, value): (&str, &str)) -> Self {
        ErrorContext::KeyValue(key.to_string(), value.to_string())
    }
}

impl From<RecordId> for ErrorContext {
    fn from(id: RecordId) -> Self {
        ErrorContext::KeyValue("record".to_string(), id.to_string())
    }
}

impl From<&str> for ErrorContext {
    fn from(msg: &str) -> Self {
        ErrorContext::Custom(msg.to_string())
    }
}
