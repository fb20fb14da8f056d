//! 存储操作的错误上下文
//!
//! 把底层 sqlx / serde 错误转换为带键名和操作信息的 ReelError::Storage。

use chrono::{DateTime, Utc};
use reelgen_errors::ReelError;
use sqlx::Error as SqlxError;
use std::fmt;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub enum RepositoryOperation {
    Read,
    Write,
    Migrate,
    Load,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Read => write!(f, "读取"),
            RepositoryOperation::Write => write!(f, "写入"),
            RepositoryOperation::Migrate => write!(f, "迁移"),
            RepositoryOperation::Load => write!(f, "加载"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KvOperationContext {
    pub operation: RepositoryOperation,
    pub key: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl KvOperationContext {
    pub fn new(operation: RepositoryOperation) -> Self {
        Self {
            operation,
            key: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn entity_description(&self) -> String {
        match &self.key {
            Some(key) => format!("键 '{key}'"),
            None => "键值存储".to_string(),
        }
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    pub fn kv_database_error(context: KvOperationContext, error: SqlxError) -> ReelError {
        let error_msg = format!(
            "{}{}失败: {}",
            context.operation,
            context.entity_description(),
            error
        );
        error!(
            error = %error,
            timestamp = %context.timestamp,
            "{}", error_msg
        );
        ReelError::storage(error_msg)
    }

    pub fn kv_decode_error(context: KvOperationContext, error: serde_json::Error) -> ReelError {
        let error_msg = format!(
            "{}{}时数据格式损坏: {}",
            context.operation,
            context.entity_description(),
            error
        );
        error!(error = %error, "{}", error_msg);
        ReelError::storage(error_msg)
    }
}
