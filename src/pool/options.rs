//! 连接池与单次连接的选项

use livepool_client::LoginRequest;
use livepool_config::ConfigUpdate;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 会话键校验函数，接收规范化之前的原始会话键
pub type SessionValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// `configure` 的参数
///
/// 未设置的字段保留当前值。
#[derive(Clone, Default)]
pub struct PoolOptions {
    pub update: ConfigUpdate,
    pub is_valid_session: Option<SessionValidator>,
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置配置变更
    pub fn update(mut self, update: ConfigUpdate) -> Self {
        self.update = update;
        self
    }

    /// 设置会话键校验函数
    pub fn is_valid_session(mut self, validator: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.is_valid_session = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("update", &self.update)
            .field("is_valid_session", &self.is_valid_session.is_some())
            .finish()
    }
}

/// `connect` 的参数
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// 目标地址，缺省使用配置中的地址
    pub url: Option<String>,
    /// 会话键，可以是任意 JSON 值
    pub session_key: Option<Value>,
    /// 登录请求，为空时不登录
    pub login: LoginRequest,
    /// 为 true 时不声明 `ddpproxy`，服务端照常自动发布
    pub auto_publish: bool,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn session_key(mut self, key: impl Into<Value>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    pub fn login(mut self, login: LoginRequest) -> Self {
        self.login = login;
        self
    }

    pub fn auto_publish(mut self, enabled: bool) -> Self {
        self.auto_publish = enabled;
        self
    }
}
