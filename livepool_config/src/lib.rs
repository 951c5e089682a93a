//! 配置管理系统
//!
//! 提供连接池配置，支持 TOML 文件、环境变量覆盖和增量合并。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析配置文件失败: {0}")]
    Parse(String),

    /// 验证错误
    #[error("配置验证失败: {0}")]
    Validation(String),

    /// 环境变量错误
    #[error("环境变量解析失败: {0}")]
    EnvVar(String),
}

/// 配置 Result 类型
pub type Result<T> = std::result::Result<T, ConfigError>;

/// 清理间隔非法时使用的安全默认值（毫秒）
pub const FALLBACK_EXPIRE_INTERVAL_MS: u64 = 60_000;

/// 连接池配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// 未指定 url 时使用的默认服务器地址
    #[serde(default = "default_url")]
    pub url: String,

    /// 无会话连接的存活时间（秒），小于等于 0 表示立即过期
    #[serde(default = "default_expire")]
    pub connection_expire: i64,

    /// 建立连接的超时时间（秒）
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// 带会话连接的存活时间（秒）
    #[serde(default = "default_expire")]
    pub session_expire: i64,

    /// 会话恢复后重新设置的存活时间（秒）
    #[serde(default = "default_expire")]
    pub session_expire_on_resume: i64,

    /// 过期清理间隔（秒）
    #[serde(default = "default_expire_interval")]
    pub expire_interval: f64,

    /// 传输层选项
    #[serde(default)]
    pub transport: TransportOptions,
}

/// 传输层选项
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportOptions {
    /// 握手时附加的 HTTP 头
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// 断线后是否自动重连
    #[serde(default = "default_retry")]
    pub retry: bool,

    /// 重连间隔（毫秒）
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// 不输出传输层错误日志
    #[serde(default)]
    pub quiet_errors: bool,
}

/// 增量配置
///
/// 只有出现的字段会覆盖当前配置，其余字段保持原值。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub connection_expire: Option<i64>,
    #[serde(default)]
    pub connection_timeout: Option<u64>,
    #[serde(default)]
    pub session_expire: Option<i64>,
    #[serde(default)]
    pub session_expire_on_resume: Option<i64>,
    #[serde(default)]
    pub expire_interval: Option<f64>,
    #[serde(default)]
    pub transport: Option<TransportOptions>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connection_expire: default_expire(),
            connection_timeout: default_connection_timeout(),
            session_expire: default_expire(),
            session_expire_on_resume: default_expire(),
            expire_interval: default_expire_interval(),
            transport: TransportOptions::default(),
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            retry: default_retry(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            quiet_errors: false,
        }
    }
}

impl TransportOptions {
    /// 重连间隔
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl ConfigUpdate {
    /// 创建空的增量配置
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn connection_expire(mut self, secs: i64) -> Self {
        self.connection_expire = Some(secs);
        self
    }

    pub fn connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout = Some(secs);
        self
    }

    pub fn session_expire(mut self, secs: i64) -> Self {
        self.session_expire = Some(secs);
        self
    }

    pub fn session_expire_on_resume(mut self, secs: i64) -> Self {
        self.session_expire_on_resume = Some(secs);
        self
    }

    pub fn expire_interval(mut self, secs: f64) -> Self {
        self.expire_interval = Some(secs);
        self
    }

    pub fn transport(mut self, transport: TransportOptions) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 是否没有任何字段
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl PoolConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("读取配置文件失败: {}", e)))?;

        Self::from_toml(&content)
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(format!("解析配置文件失败: {}", e)))
    }

    /// 从环境变量加载配置并覆盖
    ///
    /// 支持的环境变量：
    /// - LIVEPOOL_URL: 默认服务器地址
    /// - LIVEPOOL_CONNECTION_EXPIRE: 无会话连接存活时间（秒）
    /// - LIVEPOOL_CONNECTION_TIMEOUT: 连接超时（秒）
    /// - LIVEPOOL_SESSION_EXPIRE: 会话连接存活时间（秒）
    /// - LIVEPOOL_SESSION_EXPIRE_ON_RESUME: 会话恢复后存活时间（秒）
    /// - LIVEPOOL_EXPIRE_INTERVAL: 过期清理间隔（秒）
    pub fn load_with_env_override(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("LIVEPOOL_URL") {
            self.url = url;
        }

        if let Some(secs) = env_number("LIVEPOOL_CONNECTION_EXPIRE")? {
            self.connection_expire = secs;
        }

        if let Some(secs) = env_number("LIVEPOOL_CONNECTION_TIMEOUT")? {
            self.connection_timeout = secs;
        }

        if let Some(secs) = env_number("LIVEPOOL_SESSION_EXPIRE")? {
            self.session_expire = secs;
        }

        if let Some(secs) = env_number("LIVEPOOL_SESSION_EXPIRE_ON_RESUME")? {
            self.session_expire_on_resume = secs;
        }

        if let Some(secs) = env_number("LIVEPOOL_EXPIRE_INTERVAL")? {
            self.expire_interval = secs;
        }

        Ok(self)
    }

    /// 从文件加载并应用环境变量覆盖
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file(path)?.load_with_env_override()
    }

    /// 将增量配置合并到当前配置
    pub fn merge(mut self, update: ConfigUpdate) -> Self {
        if let Some(url) = update.url {
            self.url = url;
        }
        if let Some(secs) = update.connection_expire {
            self.connection_expire = secs;
        }
        if let Some(secs) = update.connection_timeout {
            self.connection_timeout = secs;
        }
        if let Some(secs) = update.session_expire {
            self.session_expire = secs;
        }
        if let Some(secs) = update.session_expire_on_resume {
            self.session_expire_on_resume = secs;
        }
        if let Some(secs) = update.expire_interval {
            self.expire_interval = secs;
        }
        if let Some(transport) = update.transport {
            self.transport = transport;
        }
        self
    }

    /// 验证配置是否有效
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Validation("默认地址不能为空".to_string()));
        }

        if self.connection_timeout == 0 {
            return Err(ConfigError::Validation("连接超时不能为 0".to_string()));
        }

        Ok(())
    }

    /// 连接超时
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    /// 过期清理间隔
    ///
    /// 负数或非有限值回退到 60 秒，0 提升到 1 毫秒。
    pub fn expire_interval(&self) -> Duration {
        let millis = self.expire_interval * 1000.0;
        if !millis.is_finite() || millis < 0.0 {
            return Duration::from_millis(FALLBACK_EXPIRE_INTERVAL_MS);
        }
        Duration::from_millis((millis as u64).max(1))
    }

    /// 获取配置摘要信息
    pub fn summary(&self) -> String {
        format!(
            "LivePool 连接池配置:\n  地址: {}\n  连接超时: {}s\n  连接存活: {}s\n  会话存活: {}s\n  恢复后存活: {}s\n  清理间隔: {:?}",
            self.url,
            self.connection_timeout,
            self.connection_expire,
            self.session_expire,
            self.session_expire_on_resume,
            self.expire_interval()
        )
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVar(format!("{} 必须是有效的数字", key))),
        Err(_) => Ok(None),
    }
}

// 默认值函数
fn default_url() -> String {
    std::env::var("ROOT_URL").unwrap_or_else(|_| "http://localhost:3000/".to_string())
}

fn default_expire() -> i64 {
    900 // 15 分钟
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_expire_interval() -> f64 {
    120.0 // 2 分钟
}

fn default_retry() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}
