//! 传输层抽象
//!
//! 定义文本帧双工通道和建立通道的统一接口。

pub mod websocket;

use async_trait::async_trait;
use livepool_config::TransportOptions;
use livepool_core::PoolError;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

pub use websocket::WebSocketConnector;

/// 传输错误
#[derive(Error, Debug)]
pub enum TransportError {
    /// 地址错误
    #[error("地址无效: {0}")]
    InvalidUrl(String),

    /// 不支持的协议
    #[error("不支持的协议: {0}")]
    UnsupportedScheme(String),

    /// 请求头错误
    #[error("请求头无效: {0}")]
    Header(String),

    /// 握手失败
    #[error("握手失败: {0}")]
    Handshake(String),

    /// 对端不可达
    #[error("连接被拒绝: {0}")]
    Unreachable(String),
}

/// 传输层 Result 类型
pub type Result<T> = std::result::Result<T, TransportError>;

impl From<TransportError> for PoolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidUrl(msg) | TransportError::UnsupportedScheme(msg) => {
                PoolError::invalid_url(msg)
            }
            other => PoolError::network(other.to_string()),
        }
    }
}

/// 文本帧双工通道
///
/// 丢弃 `outbound` 表示本端关闭；`inbound` 返回 `None` 表示对端关闭。
#[derive(Debug)]
pub struct Duplex {
    /// 发往对端的文本帧
    pub outbound: mpsc::UnboundedSender<String>,
    /// 来自对端的文本帧
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl Duplex {
    /// 创建一对互联的内存通道
    pub fn pair() -> (Duplex, Duplex) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Duplex {
                outbound: a_tx,
                inbound: b_rx,
            },
            Duplex {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }
}

/// 连接器 trait
///
/// 每次调用 `open` 建立一条新的通道，失败时由调用方决定是否重试。
#[async_trait]
pub trait Connector: Send + Sync {
    /// 打开到 `url` 的通道
    async fn open(&self, url: &str, options: &TransportOptions) -> Result<Duplex>;
}

/// 把服务器地址转换为 WebSocket 端点
///
/// `http`/`https` 分别映射为 `ws`/`wss`，路径末尾追加 `websocket`。
pub fn websocket_url(url: &str) -> Result<Url> {
    let mut parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))?;
    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TransportError::UnsupportedScheme(other.to_string())),
    };
    parsed
        .set_scheme(scheme)
        .map_err(|_| TransportError::UnsupportedScheme(scheme.to_string()))?;

    if !parsed.path().ends_with("/websocket") {
        let path = format!("{}/websocket", parsed.path().trim_end_matches('/'));
        parsed.set_path(&path);
    }
    Ok(parsed)
}
