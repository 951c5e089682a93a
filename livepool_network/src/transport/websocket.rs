//! WebSocket 连接器
//!
//! 基于 tokio-tungstenite 建立连接，并用后台任务在 socket 与通道之间转发文本帧。

use super::{Connector, Duplex, Result, TransportError, websocket_url};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use livepool_config::TransportOptions;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

/// WebSocket 连接器
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// 创建连接器
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str, options: &TransportOptions) -> Result<Duplex> {
        let endpoint = websocket_url(url)?;
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        for (name, value) in &options.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Header(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Header(format!("{}: {}", name, e)))?;
            request.headers_mut().insert(header, value);
        }

        let (stream, _) = connect_async(request).await.map_err(|e| match e {
            tungstenite::Error::Io(io) => TransportError::Unreachable(io.to_string()),
            other => TransportError::Handshake(other.to_string()),
        })?;
        debug!(endpoint = %endpoint, "WebSocket 已连接");

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let quiet = options.quiet_errors;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                report(quiet, &e);
                                break;
                            }
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    incoming = source.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if inbound_tx.send(text.to_string()).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            report(quiet, &e);
                            break;
                        }
                    },
                }
            }
            debug!(endpoint = %endpoint, "WebSocket 转发任务结束");
        });

        Ok(Duplex {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn report(quiet: bool, err: &tungstenite::Error) {
    if quiet {
        debug!("WebSocket 错误: {}", err);
    } else {
        warn!("WebSocket 错误: {}", err);
    }
}
