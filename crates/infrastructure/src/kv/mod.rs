pub mod memory;
pub mod persist;
pub mod sqlite;

pub use memory::InMemoryKeyValueStore;
pub use persist::PersistPolicy;
pub use sqlite::SqliteKeyValueStore;

use reelgen_core::{StorageBackend, StorageConfig};
use reelgen_domain::KeyValueStore;
use reelgen_errors::ReelResult;
use std::sync::Arc;
use tracing::{debug, info};

/// 键名约定：`{prefix}:reels` 等
#[derive(Debug, Clone)]
pub struct StorageKeys {
    prefix: String,
}

impl StorageKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn reels(&self) -> String {
        format!("{}:reels", self.prefix)
    }

    pub fn schedule(&self) -> String {
        format!("{}:schedule", self.prefix)
    }

    pub fn user(&self) -> String {
        format!("{}:user", self.prefix)
    }

    pub fn last_generation(&self) -> String {
        format!("{}:lastGen", self.prefix)
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::new("reelgen")
    }
}

pub struct KeyValueStoreFactory;

impl KeyValueStoreFactory {
    pub async fn create(config: &StorageConfig) -> ReelResult<Arc<dyn KeyValueStore>> {
        debug!("Creating key-value store with backend: {:?}", config.backend);

        match config.backend {
            StorageBackend::Memory => {
                info!("使用内存键值存储，进程退出后数据不保留");
                Ok(Arc::new(InMemoryKeyValueStore::new()))
            }
            StorageBackend::Sqlite => {
                info!(url = %config.sqlite_url, "初始化SQLite键值存储");
                let store = SqliteKeyValueStore::connect(&config.sqlite_url).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
