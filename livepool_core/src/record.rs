//! 连接记录
//!
//! 定义记录 ID 和持久化的连接元数据，一个池化连接对应一条记录。

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 记录唯一标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// 创建新的记录 ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 记录 ID 生成器
#[derive(Debug)]
pub struct RecordIdGenerator {
    next_id: AtomicU64,
}

impl RecordIdGenerator {
    /// 创建新的生成器
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// 从指定值开始生成
    pub fn starting_at(first: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first),
        }
    }

    /// 生成下一个 ID
    pub fn next(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for RecordIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 连接记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// 记录 ID
    pub id: RecordId,
    /// 目标服务器地址
    pub url: String,
    /// 规范化后的会话键
    pub session_key: Option<String>,
    /// 恢复凭证
    pub resume: Option<String>,
    /// 过期时间
    pub expire_at: DateTime<Utc>,
}

impl ConnectionRecord {
    /// 在给定时间点是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at < now
    }
}

/// 待插入的记录，ID 由存储分配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub url: String,
    pub session_key: Option<String>,
    pub resume: Option<String>,
    pub expire_at: DateTime<Utc>,
}

impl NewRecord {
    /// 绑定 ID，生成完整记录
    pub fn with_id(self, id: RecordId) -> ConnectionRecord {
        ConnectionRecord {
            id,
            url: self.url,
            session_key: self.session_key,
            resume: self.resume,
            expire_at: self.expire_at,
        }
    }
}

/// 记录的部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// 新的恢复凭证（`Some(None)` 表示清空）
    pub resume: Option<Option<String>>,
    /// 新的过期时间
    pub expire_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    /// 只更新恢复凭证
    pub fn resume(token: impl Into<String>) -> Self {
        Self {
            resume: Some(Some(token.into())),
            ..Default::default()
        }
    }

    /// 只更新过期时间
    pub fn expire_at(at: DateTime<Utc>) -> Self {
        Self {
            expire_at: Some(at),
            ..Default::default()
        }
    }

    /// 应用到记录
    pub fn apply(&self, record: &mut ConnectionRecord) {
        if let Some(resume) = &self.resume {
            record.resume = resume.clone();
        }
        if let Some(at) = self.expire_at {
            record.expire_at = at;
        }
    }
}

/// 计算 `now + ttl_secs` 的过期时间
///
/// 溢出时取时间范围的边界值，ttl 小于等于 0 得到已过期的时间点。
pub fn expire_after(now: DateTime<Utc>, ttl_secs: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(ttl_secs)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(if ttl_secs > 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}
