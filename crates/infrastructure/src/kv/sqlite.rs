use async_trait::async_trait;
use reelgen_domain::KeyValueStore;
use reelgen_errors::ReelResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::error_handling::{KvOperationContext, RepositoryErrorHelpers, RepositoryOperation};

/// 基于 SQLite 的键值存储，表 `kv_store(key, value, updated_at)`
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub async fn new(pool: SqlitePool) -> ReelResult<Self> {
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// 按 URL 打开（文件不存在时自动创建）并初始化表结构
    pub async fn connect(database_url: &str) -> ReelResult<Self> {
        debug!("Opening SQLite key-value store at: {}", database_url);

        let context = || KvOperationContext::new(RepositoryOperation::Migrate);
        let mut connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RepositoryErrorHelpers::kv_database_error(context(), e))?
            .create_if_missing(true);
        if !database_url.contains(":memory:") {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        // 内存库的每个连接都是独立的数据库
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .connect_with(connect_options)
            .await
            .map_err(|e| RepositoryErrorHelpers::kv_database_error(context(), e))?;

        Self::new(pool).await
    }

    async fn run_migrations(pool: &SqlitePool) -> ReelResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::kv_database_error(
                KvOperationContext::new(RepositoryOperation::Migrate).with_key("kv_store"),
                e,
            )
        })?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> ReelResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                RepositoryErrorHelpers::kv_database_error(
                    KvOperationContext::new(RepositoryOperation::Read).with_key(key),
                    e,
                )
            })?;

        match row {
            Some(row) => {
                let value: String = row.try_get("value").map_err(|e| {
                    RepositoryErrorHelpers::kv_database_error(
                        KvOperationContext::new(RepositoryOperation::Read).with_key(key),
                        e,
                    )
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &str) -> ReelResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::kv_database_error(
                KvOperationContext::new(RepositoryOperation::Write).with_key(key),
                e,
            )
        })?;
        Ok(())
    }
}
