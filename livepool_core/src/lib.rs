//! LivePool 核心类型
//!
//! 提供错误类型、连接记录、记录存储抽象、会话键规范化和恢复凭证生成。

pub mod credential;
pub mod error;
pub mod file_store;
pub mod record;
pub mod session;
pub mod store;

// 导出主要类型到 crate root
pub use crate::credential::{RESUME_CREDENTIAL_LEN, generate_resume_credential};
pub use crate::error::{ErrorContext, PoolError, PoolErrorKind, Result};
pub use crate::file_store::FileRecordStore;
pub use crate::record::{ConnectionRecord, NewRecord, RecordId, RecordIdGenerator, RecordPatch, expire_after};
pub use crate::session::canonical_session_key;
pub use crate::store::{ExpireBound, MemoryRecordStore, RecordFilter, RecordStore};

// 预导出
pub mod prelude {
    pub use crate::error::{PoolError, PoolErrorKind, Result};
    pub use crate::record::{ConnectionRecord, NewRecord, RecordId, RecordPatch};
    pub use crate::store::{MemoryRecordStore, RecordFilter, RecordStore};
}
