use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub sqlite_url: String,
    /// 所有键的前缀，例如 `reelgen:reels`
    pub key_prefix: String,
    pub persist_retries: u32,
    pub persist_retry_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            sqlite_url: "sqlite://reelgen.db?mode=rwc".to_string(),
            key_prefix: "reelgen".to_string(),
            persist_retries: 3,
            persist_retry_delay_ms: 100,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.key_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("键前缀不能为空"));
        }
        if self.key_prefix.contains(char::is_whitespace) {
            return Err(anyhow::anyhow!("键前缀不能包含空白字符: {}", self.key_prefix));
        }
        if self.backend == StorageBackend::Sqlite && !self.sqlite_url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!(
                "SQLite连接URL格式无效: {}",
                self.sqlite_url
            ));
        }
        if self.persist_retries == 0 {
            return Err(anyhow::anyhow!("持久化尝试次数必须大于0"));
        }
        Ok(())
    }

    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }
}
