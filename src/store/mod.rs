//! AgentRecord 存储
//!
//! 协调器在每次状态变更后整体写入记录；Actor 被回收或服务重启后从这里恢复。
//! 默认内存存储；启用 async-sqlite 且配置了 db_path 时使用 SQLite。

#[cfg(feature = "async-sqlite")]
pub mod sqlite;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::coordinator::AgentRecord;

#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteRecordStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// AgentRecord 存储抽象
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 读取记录；从未写入过时返回 None
    async fn load(&self, identity: &str) -> Result<Option<AgentRecord>, StoreError>;

    /// 覆盖写入
    async fn save(&self, record: &AgentRecord) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// 内存存储（进程退出即丢失）
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, AgentRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load(&self, identity: &str) -> Result<Option<AgentRecord>, StoreError> {
        Ok(self.records.read().await.get(identity).cloned())
    }

    async fn save(&self, record: &AgentRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}

/// 创建记录存储
///
/// 提供 db_path 且启用 async-sqlite feature 时使用 SQLite，否则使用内存存储
pub async fn create_record_store(db_path: Option<&Path>) -> Arc<dyn RecordStore> {
    #[cfg(feature = "async-sqlite")]
    if let Some(path) = db_path {
        match SqliteRecordStore::new(path).await {
            Ok(store) => {
                tracing::info!("Using SQLite record store: {:?}", path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open SQLite store, falling back to memory: {}", e);
            }
        }
    }

    #[cfg(not(feature = "async-sqlite"))]
    if db_path.is_some() {
        tracing::warn!("Persistent record store requested but async-sqlite feature not enabled, using memory store");
    }

    tracing::info!("Using in-memory record store");
    Arc::new(MemoryRecordStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryRecordStore::new();
        assert!(store.load("a1").await.unwrap().is_none());

        let mut record = AgentRecord::new("a1");
        record.total_credits = 100;
        store.save(&record).await.unwrap();

        let loaded = store.load("a1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_without_path_is_memory() {
        let store = create_record_store(None).await;
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
