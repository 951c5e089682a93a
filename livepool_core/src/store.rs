//! 记录存储
//!
//! 连接记录表的抽象和默认的内存实现。

use crate::error::{PoolError, Result};
use crate::record::{ConnectionRecord, NewRecord, RecordId, RecordIdGenerator, RecordPatch};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 过期时间的范围条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireBound {
    /// `expire_at >= t`，仍然有效
    NotBefore(DateTime<Utc>),
    /// `expire_at < t`，已经过期
    Before(DateTime<Utc>),
}

impl ExpireBound {
    fn matches(&self, expire_at: DateTime<Utc>) -> bool {
        match *self {
            ExpireBound::NotBefore(t) => expire_at >= t,
            ExpireBound::Before(t) => expire_at < t,
        }
    }
}

/// 记录查询条件
///
/// 未设置的字段不参与匹配。`session_key` 和 `resume` 为精确匹配，
/// 两边都为空也视为相等。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub url: Option<String>,
    pub session_key: Option<Option<String>>,
    pub resume: Option<Option<String>>,
    pub expire: Option<ExpireBound>,
}

impl RecordFilter {
    /// 匹配所有记录
    pub fn all() -> Self {
        Self::default()
    }

    /// 已过期的记录
    pub fn expired_at(now: DateTime<Utc>) -> Self {
        Self::all().expire(ExpireBound::Before(now))
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn session_key(mut self, key: Option<String>) -> Self {
        self.session_key = Some(key);
        self
    }

    pub fn resume(mut self, resume: Option<String>) -> Self {
        self.resume = Some(resume);
        self
    }

    pub fn expire(mut self, bound: ExpireBound) -> Self {
        self.expire = Some(bound);
        self
    }

    /// 记录是否满足条件
    pub fn matches(&self, record: &ConnectionRecord) -> bool {
        if let Some(url) = &self.url {
            if *url != record.url {
                return false;
            }
        }
        if let Some(key) = &self.session_key {
            if *key != record.session_key {
                return false;
            }
        }
        if let Some(resume) = &self.resume {
            if *resume != record.resume {
                return false;
            }
        }
        if let Some(bound) = &self.expire {
            if !bound.matches(record.expire_at) {
                return false;
            }
        }
        true
    }
}

/// 记录存储抽象
///
/// 连接池只通过这组操作访问元数据，可以替换为持久化实现。
pub trait RecordStore: Send + Sync {
    /// 插入记录并返回分配的 ID
    fn insert(&self, record: NewRecord) -> Result<RecordId>;

    /// 部分更新，记录不存在时返回 `false`
    fn update(&self, id: RecordId, patch: RecordPatch) -> Result<bool>;

    /// 删除记录，记录不存在时返回 `false`
    fn remove(&self, id: RecordId) -> Result<bool>;

    /// 返回第一条匹配的记录（按 ID 升序）
    fn find_one(&self, filter: &RecordFilter) -> Result<Option<ConnectionRecord>>;

    /// 返回所有匹配的记录（按 ID 升序）
    fn find_all(&self, filter: &RecordFilter) -> Result<Vec<ConnectionRecord>>;

    /// 按 ID 查询
    fn get(&self, id: RecordId) -> Result<Option<ConnectionRecord>> {
        Ok(self.find_all(&RecordFilter::all())?.into_iter().find(|r| r.id == id))
    }

    /// 记录数量
    fn count(&self) -> Result<usize> {
        Ok(self.find_all(&RecordFilter::all())?.len())
    }
}

/// 内存记录存储
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    /// 内部存储（使用 Arc<RwLock> 实现并发访问）
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    records: HashMap<RecordId, ConnectionRecord>,
    id_generator: RecordIdGenerator,
}

impl MemoryRecordStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStoreInner {
                records: HashMap::new(),
                id_generator: RecordIdGenerator::new(),
            })),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| PoolError::store(format!("获取读锁失败: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| PoolError::store(format!("获取写锁失败: {}", e)))
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 按 ID 升序筛选
pub(crate) fn select<'a>(
    records: impl Iterator<Item = &'a ConnectionRecord>,
    filter: &RecordFilter,
) -> Vec<ConnectionRecord> {
    let mut matched: Vec<ConnectionRecord> =
        records.filter(|r| filter.matches(r)).cloned().collect();
    matched.sort_by_key(|r| r.id);
    matched
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, record: NewRecord) -> Result<RecordId> {
        let mut inner = self.write()?;
        let id = inner.id_generator.next();
        inner.records.insert(id, record.with_id(id));
        Ok(id)
    }

    fn update(&self, id: RecordId, patch: RecordPatch) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.records.get_mut(&id) {
            Some(record) => {
                patch.apply(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: RecordId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.records.remove(&id).is_some())
    }

    fn find_one(&self, filter: &RecordFilter) -> Result<Option<ConnectionRecord>> {
        let inner = self.read()?;
        Ok(select(inner.records.values(), filter).into_iter().next())
    }

    fn find_all(&self, filter: &RecordFilter) -> Result<Vec<ConnectionRecord>> {
        let inner = self.read()?;
        Ok(select(inner.records.values(), filter))
    }

    fn get(&self, id: RecordId) -> Result<Option<ConnectionRecord>> {
        let inner = self.read()?;
        Ok(inner.records.get(&id).cloned())
    }

    fn count(&self) -> Result<usize> {
        let inner = self.read()?;
        Ok(inner.records.len())
    }
}
