//! LivePool 网络层
//!
//! 提供 DDP 消息定义、握手能力协商以及文本帧传输抽象。

pub mod protocol;
pub mod transport;

// 导出主要类型到 crate root
pub use crate::protocol::{
    Fields, Message, MethodError, PROXY_CAPABILITY, SUPPORTED_DDP_VERSIONS, negotiate_support,
    preferred_version,
};
pub use crate::transport::{
    Connector, Duplex, TransportError, WebSocketConnector, websocket_url,
};

// 预导出
pub mod prelude {
    pub use crate::protocol::{Message, negotiate_support};
    pub use crate::transport::{Connector, Duplex, WebSocketConnector};
}
