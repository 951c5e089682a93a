//! 协议层
//!
//! DDP 消息定义和握手能力协商。

pub mod capability;
pub mod message;

pub use capability::{PROXY_CAPABILITY, SUPPORTED_DDP_VERSIONS, negotiate_support, preferred_version};
pub use message::{Fields, Message, MethodError};
