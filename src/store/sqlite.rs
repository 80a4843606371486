//! SQLite 记录存储
//!
//! 每个 Agent 一行，完整记录以 JSON 存放；status / updated_at 冗余一列便于排查。

use std::path::Path;

use async_trait::async_trait;
use sqlx::Row;

use super::{RecordStore, StoreError};
use crate::coordinator::AgentRecord;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

pub struct SqliteRecordStore {
    pool: sqlx::sqlite::SqlitePool,
}

impl SqliteRecordStore {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agent_records (
                identity TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                record TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn load(&self, identity: &str) -> Result<Option<AgentRecord>, StoreError> {
        let row = sqlx::query("SELECT record FROM agent_records WHERE identity = ?")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.get("record");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, record: &AgentRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO agent_records (identity, status, record, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(identity) DO UPDATE SET
                status = excluded.status,
                record = excluded.record,
                updated_at = excluded.updated_at",
        )
        .bind(&record.identity)
        .bind(record.status.as_str())
        .bind(json)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM agent_records")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }
}
