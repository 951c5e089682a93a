//! 文件记录存储
//!
//! 将记录表保存为 JSON 文件，进程重启后可以重新加载。

use crate::error::{PoolError, Result};
use crate::record::{ConnectionRecord, NewRecord, RecordId, RecordPatch};
use crate::store::{RecordFilter, RecordStore, select};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const STORE_SCHEMA_VERSION: u32 = 1;

/// 磁盘上的文件格式
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    schema: u32,
    next_id: u64,
    #[serde(default)]
    records: Vec<ConnectionRecord>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            schema: STORE_SCHEMA_VERSION,
            next_id: 1,
            records: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct FileStoreInner {
    records: BTreeMap<RecordId, ConnectionRecord>,
    next_id: u64,
}

/// JSON 文件记录存储
///
/// 每次修改后先写临时文件再重命名覆盖。
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    inner: Mutex<FileStoreInner>,
}

impl FileRecordStore {
    /// 打开存储，文件不存在时创建空表
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<StoreFile>(&content)
                .map_err(|e| PoolError::store(format!("解析记录文件失败: {}", e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => return Err(e.into()),
        };

        if file.schema != STORE_SCHEMA_VERSION {
            return Err(PoolError::store(format!("不支持的记录文件版本: {}", file.schema)));
        }

        let records: BTreeMap<_, _> = file.records.into_iter().map(|r| (r.id, r)).collect();
        let next_id = records
            .keys()
            .last()
            .map(|id| id.value() + 1)
            .unwrap_or(1)
            .max(file.next_id);

        debug!(path = %path.display(), records = records.len(), "记录文件已加载");

        Ok(Self {
            path,
            inner: Mutex::new(FileStoreInner { records, next_id }),
        })
    }

    /// 文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, FileStoreInner>> {
        self.inner
            .lock()
            .map_err(|e| PoolError::store(format!("获取锁失败: {}", e)))
    }

    fn persist(&self, inner: &FileStoreInner) -> Result<()> {
        let file = StoreFile {
            schema: STORE_SCHEMA_VERSION,
            next_id: inner.next_id,
            records: inner.records.values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn insert(&self, record: NewRecord) -> Result<RecordId> {
        let mut inner = self.lock()?;
        let id = RecordId::new(inner.next_id);
        inner.next_id += 1;
        inner.records.insert(id, record.with_id(id));
        self.persist(&inner).map_err(|e| e.with_context(id))?;
        Ok(id)
    }

    fn update(&self, id: RecordId, patch: RecordPatch) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(record) = inner.records.get_mut(&id) else {
            return Ok(false);
        };
        patch.apply(record);
        self.persist(&inner).map_err(|e| e.with_context(id))?;
        Ok(true)
    }

    fn remove(&self, id: RecordId) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.records.remove(&id).is_none() {
            return Ok(false);
        }
        self.persist(&inner).map_err(|e| e.with_context(id))?;
        Ok(true)
    }

    fn find_one(&self, filter: &RecordFilter) -> Result<Option<ConnectionRecord>> {
        let inner = self.lock()?;
        Ok(inner.records.values().find(|r| filter.matches(r)).cloned())
    }

    fn find_all(&self, filter: &RecordFilter) -> Result<Vec<ConnectionRecord>> {
        let inner = self.lock()?;
        Ok(select(inner.records.values(), filter))
    }

    fn get(&self, id: RecordId) -> Result<Option<ConnectionRecord>> {
        let inner = self.lock()?;
        Ok(inner.records.get(&id).cloned())
    }

    fn count(&self) -> Result<usize> {
        let inner = self.lock()?;
        Ok(inner.records.len())
    }
}
