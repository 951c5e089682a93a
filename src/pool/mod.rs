//! 连接池
//!
//! 管理一组长连接：创建时协商能力并可选登录，按会话键和恢复凭证恢复已有连接，
//! 按过期时间回收连接。
//!
//! 记录存储与连接句柄表只在 `handles` 锁内一起修改，锁内不做任何等待，
//! 关闭回调在锁外执行。

mod expiry;
mod options;

pub use options::{ConnectOptions, PoolOptions, SessionValidator};

use crate::{Error, Result};
use chrono::Utc;
use expiry::ExpiryTask;
use livepool_client::{ClientError, ConnectionOptions, LiveConnection, LoginRequest, LoginResult, LoginStatus};
use livepool_config::PoolConfig;
use livepool_core::{
    ExpireBound, MemoryRecordStore, NewRecord, PoolError, RecordFilter, RecordId, RecordPatch, RecordStore,
    canonical_session_key, expire_after, generate_resume_credential,
};
use livepool_network::{Connector, WebSocketConnector, negotiate_support};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

struct Settings {
    config: PoolConfig,
    is_valid_session: SessionValidator,
}

pub(crate) struct PoolInner {
    settings: RwLock<Settings>,
    store: Arc<dyn RecordStore>,
    /// 唯一的修改路径
    handles: Mutex<HashMap<RecordId, LiveConnection>>,
    connector: Arc<dyn Connector>,
    expiry: Mutex<Option<ExpiryTask>>,
}

impl PoolInner {
    /// 连接关闭后删除句柄与记录
    fn forget(&self, id: RecordId) {
        let mut handles = self.handles.lock();
        handles.remove(&id);
        if let Err(e) = self.store.remove(id) {
            warn!(record = %id, "删除连接记录失败: {}", e);
        }
        debug!(record = %id, remaining = handles.len(), "连接已移出连接池");
    }
}

/// 连接池构建器
pub struct PoolBuilder {
    config: PoolConfig,
    options: PoolOptions,
    store: Option<Arc<dyn RecordStore>>,
    connector: Option<Arc<dyn Connector>>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            options: PoolOptions::default(),
            store: None,
            connector: None,
        }
    }

    /// 基础配置，`options` 中的变更在其之上合并
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// 记录存储，缺省为内存存储
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 连接器，缺省为 WebSocket
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// 构建连接池并启动过期清理
    pub fn build(self) -> ConnectionPool {
        let inner = PoolInner {
            settings: RwLock::new(Settings {
                config: self.config,
                is_valid_session: Arc::new(|_| true),
            }),
            store: self.store.unwrap_or_else(|| Arc::new(MemoryRecordStore::new())),
            handles: Mutex::new(HashMap::new()),
            connector: self.connector.unwrap_or_else(|| Arc::new(WebSocketConnector::new())),
            expiry: Mutex::new(None),
        };
        let pool = ConnectionPool {
            inner: Arc::new(inner),
        };
        pool.configure(self.options);
        pool
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 连接池
///
/// 克隆得到的是同一个连接池。
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// 使用默认配置创建连接池
    pub fn new() -> Self {
        PoolBuilder::new().build()
    }

    /// 使用给定选项创建连接池
    pub fn with_options(options: PoolOptions) -> Self {
        PoolBuilder::new().options(options).build()
    }

    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<PoolInner>) -> Self {
        Self { inner }
    }

    /// 合并配置并以新的间隔重启过期清理
    pub fn configure(&self, options: PoolOptions) -> &Self {
        {
            let mut settings = self.inner.settings.write();
            let merged = settings.config.clone().merge(options.update);
            if let Err(e) = merged.validate() {
                warn!("连接池配置无效: {}", e);
            }
            settings.config = merged;
            if let Some(validator) = options.is_valid_session {
                settings.is_valid_session = validator;
            }
        }
        self.start_expire()
    }

    /// 当前配置快照
    pub fn config(&self) -> PoolConfig {
        self.inner.settings.read().config.clone()
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.inner.store.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.handles.lock().len()
    }

    pub fn connection(&self, id: RecordId) -> Option<LiveConnection> {
        self.inner.handles.lock().get(&id).cloned()
    }

    /// 获取连接：优先恢复已有会话，否则新建
    ///
    /// 会话键被校验函数拒绝时返回 `Ok(None)`。登录失败不会返回错误，
    /// 结果体现在返回连接的 `login_status` 上。
    pub async fn connect(&self, options: ConnectOptions) -> Result<Option<LiveConnection>> {
        let (config, validator) = {
            let settings = self.inner.settings.read();
            (settings.config.clone(), settings.is_valid_session.clone())
        };

        let url = options
            .url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| config.url.clone());
        check_url(&url)?;

        let session_key = match &options.session_key {
            Some(raw) => {
                if !validator(raw) {
                    debug!("会话键未通过校验");
                    return Ok(None);
                }
                Some(canonical_session_key(raw))
            }
            None => None,
        };

        if let Some(key) = &session_key {
            if options.login.has_non_string_resume() {
                debug!("恢复凭证不是字符串，跳过会话恢复");
            } else if let Some(connection) = self.resume(&url, key, options.login.resume_token(), &config)? {
                return Ok(Some(connection));
            }
        }

        self.create(url, session_key, options.login, options.auto_publish, &config)
            .await
            .map(Some)
    }

    fn resume(
        &self,
        url: &str,
        session_key: &str,
        resume: Option<&str>,
        config: &PoolConfig,
    ) -> Result<Option<LiveConnection>> {
        let now = Utc::now();
        let filter = RecordFilter::all()
            .url(url)
            .session_key(Some(session_key.to_string()))
            .resume(resume.map(str::to_string))
            .expire(ExpireBound::NotBefore(now));

        let dead = {
            let handles = self.inner.handles.lock();
            let Some(record) = self.inner.store.find_one(&filter)? else {
                return Ok(None);
            };
            match handles.get(&record.id) {
                Some(connection) if !connection.status().is_dead() => {
                    let expire_at = expire_after(now, config.session_expire_on_resume);
                    self.inner.store.update(record.id, RecordPatch::expire_at(expire_at))?;
                    info!(record = %record.id, "恢复会话连接");
                    return Ok(Some(connection.clone()));
                }
                _ => record.id,
            }
        };

        debug!(record = %dead, "待恢复的连接已失效");
        self.remove_connection(dead);
        Ok(None)
    }

    async fn create(
        &self,
        url: String,
        session_key: Option<String>,
        login: LoginRequest,
        auto_publish: bool,
        config: &PoolConfig,
    ) -> Result<LiveConnection> {
        let options = ConnectionOptions::new(url.clone())
            .with_support(negotiate_support(auto_publish))
            .with_transport(config.transport.clone());
        let connection = LiveConnection::open(self.inner.connector.clone(), options)?;

        match tokio::time::timeout(config.connection_timeout(), connection.wait_connected()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                connection.close();
                warn!(url = %url, "连接失败: {}", e);
                return Err(PoolError::ConnectionTimeout.into());
            }
            Err(_) => {
                connection.close();
                warn!(url = %url, "连接超时");
                return Err(PoolError::ConnectionTimeout.into());
            }
        }

        let ttl = if session_key.is_some() {
            config.session_expire
        } else {
            config.connection_expire
        };
        let record = NewRecord {
            url,
            session_key,
            resume: (!login.is_empty()).then(generate_resume_credential),
            expire_at: expire_after(Utc::now(), ttl),
        };

        let inserted = {
            let mut handles = self.inner.handles.lock();
            self.inner.store.insert(record).map(|id| {
                handles.insert(id, connection.clone());
                id
            })
        };
        let id = match inserted {
            Ok(id) => id,
            Err(e) => {
                connection.close();
                return Err(e.with_context(("url", connection.url())).into());
            }
        };

        connection.bind_record(id);
        let pool = Arc::downgrade(&self.inner);
        connection.on_close(move || {
            if let Some(inner) = pool.upgrade() {
                inner.forget(id);
            }
        });

        if login.is_empty() {
            info!(record = %id, url = %connection.url(), "新建连接");
            return Ok(connection);
        }

        let outcome = self.install_login(&connection, id, login);
        connection.run_reconnect_hook();
        await_login(&connection, outcome).await;
        Ok(connection)
    }

    /// 安装重连钩子：每次握手成功后重放登录请求，第一次结果通过返回的通道通知
    fn install_login(&self, connection: &LiveConnection, id: RecordId, login: LoginRequest) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let first = Arc::new(Mutex::new(Some(tx)));
        let pool = Arc::downgrade(&self.inner);

        connection.set_reconnect_hook(move |connection| {
            let connection = connection.clone();
            let login = login.clone();
            let pool = pool.clone();
            let first = first.clone();
            tokio::spawn(async move {
                let outcome = connection.login(&login).await;
                if let Some(inner) = pool.upgrade() {
                    ConnectionPool::from_inner(inner).finish_login(&connection, id, outcome);
                }
                if let Some(tx) = first.lock().take() {
                    let _ = tx.send(());
                }
            });
        });
        rx
    }

    fn finish_login(&self, connection: &LiveConnection, id: RecordId, outcome: std::result::Result<LoginResult, ClientError>) {
        match outcome {
            Ok(result) => {
                let token = result.token.clone();
                if !connection.set_login_status(LoginStatus::Result(result)) {
                    debug!(record = %id, "重连后重新登录成功");
                    return;
                }
                let handles = self.inner.handles.lock();
                if handles.contains_key(&id) {
                    if let Err(e) = self.inner.store.update(id, RecordPatch::resume(token)) {
                        warn!(record = %id, "保存登录令牌失败: {}", e);
                    }
                }
                info!(record = %id, "登录成功");
            }
            Err(e) => {
                warn!(record = %id, "登录失败: {}", e);
                connection.set_login_status(LoginStatus::Error(e.to_string()));
                self.remove_connection(id);
            }
        }
    }

    /// 关闭并移除连接；没有句柄时直接删除记录
    ///
    /// 返回是否有内容被移除，重复调用不会出错。
    pub fn remove_connection(&self, id: RecordId) -> bool {
        let handle = self.inner.handles.lock().get(&id).cloned();
        if let Some(connection) = handle {
            connection.close();
            return true;
        }

        let _handles = self.inner.handles.lock();
        match self.inner.store.remove(id) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(record = %id, "删除连接记录失败: {}", e);
                false
            }
        }
    }

    /// 执行一次过期清理，返回移除的连接数
    pub fn remove_expired_connections(&self) -> Result<usize> {
        let expired = {
            let _handles = self.inner.handles.lock();
            self.inner
                .store
                .find_all(&RecordFilter::expired_at(Utc::now()))
                .map_err(|e| e.with_context("过期清理"))?
        };
        for record in &expired {
            debug!(record = %record.id, expire_at = %record.expire_at, "连接已过期");
            self.remove_connection(record.id);
        }
        Ok(expired.len())
    }

    /// 以当前配置的间隔（重新）启动过期清理
    pub fn start_expire(&self) -> &Self {
        let period = self.inner.settings.read().config.expire_interval();
        let mut expiry = self.inner.expiry.lock();
        expiry.take();
        *expiry = ExpiryTask::spawn(Arc::downgrade(&self.inner), period);
        self
    }

    /// 停止过期清理；未运行时什么也不做
    pub fn stop_expire(&self) -> &Self {
        if self.inner.expiry.lock().take().is_some() {
            debug!("过期清理已停止");
        }
        self
    }

    /// 过期清理的当前周期，未运行时为 `None`
    pub fn expire_period(&self) -> Option<Duration> {
        self.inner.expiry.lock().as_ref().map(ExpiryTask::period)
    }

    /// 停止过期清理并关闭全部连接
    pub fn stop(&self) -> Result<()> {
        self.stop_expire();

        let records = {
            let _handles = self.inner.handles.lock();
            self.inner.store.find_all(&RecordFilter::all())?
        };
        for record in &records {
            self.remove_connection(record.id);
        }

        let leftovers: Vec<_> = self.inner.handles.lock().values().cloned().collect();
        for connection in leftovers {
            connection.close();
        }

        info!(removed = records.len(), "连接池已停止");
        Ok(())
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// 等待第一次登录结果；钩子未运行就被关闭时记为登录失败
async fn await_login(connection: &LiveConnection, outcome: oneshot::Receiver<()>) {
    if outcome.await.is_err() {
        connection.set_login_status(LoginStatus::Error(ClientError::Closed.to_string()));
    }
}

fn check_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(PoolError::invalid_url("地址为空").into());
    }
    let parsed = Url::parse(url).map_err(|e| Error::from(PoolError::invalid_url(format!("{}: {}", url, e))))?;
    match parsed.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(()),
        other => Err(PoolError::invalid_url(format!("不支持的协议: {}", other)).into()),
    }
}
