//! 测试用的进程内 DDP 服务器
//!
//! 实现 `Connector`，每次 `open` 启动一个会话任务。服务器提供：
//! - `fruits` 发布，初始只有一条 `apple`
//! - `addFruit(name)` / `removeFruits()` 方法，变更广播给所有订阅者
//! - `login`：密码为 `test` 时签发令牌，已签发的 `resume` 令牌可再次登录，
//!   带 `no_token` 字段时返回不含令牌的结果，其余情况报错
//!
//! 主机名不是 `localhost` 的地址一律拒绝连接。

#![allow(dead_code)]

use async_trait::async_trait;
use livepool::TransportOptions;
use livepool_network::transport::{Result as TransportResult, TransportError};
use livepool_network::{Connector, Duplex, Message, MethodError};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const URL: &str = "http://localhost:3000/";

#[derive(Default)]
struct ServerState {
    fruits: BTreeMap<String, String>,
    next_doc: u64,
    next_token: u64,
    tokens: HashSet<String>,
    handshakes: Vec<Vec<String>>,
    login_calls: usize,
    live_sessions: usize,
    subscribers: Vec<mpsc::UnboundedSender<String>>,
}

impl ServerState {
    fn add_fruit(&mut self, name: &str) {
        self.next_doc += 1;
        let id = format!("f{}", self.next_doc);
        self.fruits.insert(id.clone(), name.to_string());
        self.broadcast(json!({"msg": "added", "collection": "fruits", "id": id, "fields": {"name": name}}));
    }

    fn remove_fruits(&mut self) {
        let ids: Vec<_> = std::mem::take(&mut self.fruits).into_keys().collect();
        for id in ids {
            self.broadcast(json!({"msg": "removed", "collection": "fruits", "id": id}));
        }
    }

    fn broadcast(&mut self, msg: Value) {
        let text = msg.to_string();
        self.subscribers.retain(|tx| tx.send(text.clone()).is_ok());
    }

    fn login(&mut self, params: &[Value]) -> Result<Value, MethodError> {
        self.login_calls += 1;
        let request = params.first().cloned().unwrap_or(Value::Null);

        if let Some(token) = request.get("resume").and_then(Value::as_str) {
            if self.tokens.contains(token) {
                return Ok(json!({"id": "u1", "token": token, "tokenExpires": {"$date": 0}}));
            }
            return Err(MethodError::new(403, "You've been logged out by the server"));
        }
        if request.get("no_token").is_some() {
            return Ok(json!({"id": "u1"}));
        }
        if request.get("password").and_then(Value::as_str) == Some("test") {
            self.next_token += 1;
            let token = format!("token-{}", self.next_token);
            self.tokens.insert(token.clone());
            return Ok(json!({"id": "u1", "token": token, "tokenExpires": {"$date": 0}}));
        }
        Err(MethodError::new(403, "User not found"))
    }
}

/// 进程内 DDP 服务器
#[derive(Clone)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        let server = Self {
            state: Arc::new(Mutex::new(ServerState::default())),
        };
        server.state.lock().add_fruit("apple");
        server
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    /// 每次握手声明的能力列表
    pub fn handshakes(&self) -> Vec<Vec<String>> {
        self.state.lock().handshakes.clone()
    }

    pub fn login_calls(&self) -> usize {
        self.state.lock().login_calls
    }

    /// 仍未断开的会话数
    pub fn live_sessions(&self) -> usize {
        self.state.lock().live_sessions
    }
}

#[async_trait]
impl Connector for FakeServer {
    async fn open(&self, url: &str, _options: &TransportOptions) -> TransportResult<Duplex> {
        let parsed = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if parsed.host_str() != Some("localhost") {
            return Err(TransportError::Unreachable(url.to_string()));
        }

        let (client, server) = Duplex::pair();
        self.state.lock().live_sessions += 1;
        tokio::spawn(serve(self.state.clone(), server));
        Ok(client)
    }
}

async fn serve(state: Arc<Mutex<ServerState>>, mut duplex: Duplex) {
    let mut session = 0u64;
    while let Some(raw) = duplex.inbound.recv().await {
        let reply = |msg: Value| {
            let _ = duplex.outbound.send(msg.to_string());
        };
        let Ok(msg) = Message::parse(&raw) else { continue };

        match msg {
            Message::Connect { support, .. } => {
                state.lock().handshakes.push(support);
                session += 1;
                reply(json!({"msg": "connected", "session": format!("session-{}", session)}));
            }
            Message::Ping { id } => reply(json!({"msg": "pong", "id": id})),
            Message::Sub { id, name, .. } if name == "fruits" => {
                let mut state = state.lock();
                for (doc, fruit) in &state.fruits {
                    reply(json!({"msg": "added", "collection": "fruits", "id": doc, "fields": {"name": fruit}}));
                }
                state.subscribers.push(duplex.outbound.clone());
                reply(json!({"msg": "ready", "subs": [id]}));
            }
            Message::Sub { id, .. } => {
                reply(json!({"msg": "nosub", "id": id, "error": MethodError::new(404, "Subscription not found")}));
            }
            Message::Method { method, params, id } => {
                let outcome = {
                    let mut state = state.lock();
                    match method.as_str() {
                        "login" => state.login(&params),
                        "addFruit" => {
                            if let Some(name) = params.first().and_then(Value::as_str) {
                                state.add_fruit(name);
                            }
                            Ok(Value::Null)
                        }
                        "removeFruits" => {
                            state.remove_fruits();
                            Ok(Value::Null)
                        }
                        _ => Err(MethodError::new(404, format!("Method '{}' not found", method))),
                    }
                };
                match outcome {
                    Ok(result) => reply(json!({"msg": "result", "id": id, "result": result})),
                    Err(error) => reply(json!({"msg": "result", "id": id, "error": error})),
                }
            }
            _ => {}
        }
    }
    state.lock().live_sessions -= 1;
}

/// 初始化测试日志
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
