use async_trait::async_trait;
use reelgen_domain::KeyValueStore;
use reelgen_errors::ReelResult;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 进程内键值存储，重启后数据丢失
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> ReelResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ReelResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_overwrite() {
        let store = InMemoryKeyValueStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get("reelgen:reels").await.unwrap(), None);

        store.set("reelgen:reels", "[]").await.unwrap();
        store.set("reelgen:reels", "[1]").await.unwrap();
        assert_eq!(
            store.get("reelgen:reels").await.unwrap().as_deref(),
            Some("[1]")
        );
        assert_eq!(store.len().await, 1);
    }
}
