use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelgen_domain::{KeyValueStore, PreferencesRepository, UserPreferences};
use reelgen_errors::ReelResult;
use std::sync::Arc;

use crate::error_handling::{KvOperationContext, RepositoryErrorHelpers, RepositoryOperation};
use crate::kv::{PersistPolicy, StorageKeys};

/// 用户偏好存于 `{prefix}:user`，上次自动生成时间存于 `{prefix}:lastGen`
pub struct KvPreferencesStore {
    kv: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    policy: PersistPolicy,
}

impl KvPreferencesStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, keys: StorageKeys, policy: PersistPolicy) -> Self {
        Self { kv, keys, policy }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> ReelResult<Option<T>> {
        match self.kv.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                RepositoryErrorHelpers::kv_decode_error(
                    KvOperationContext::new(RepositoryOperation::Read).with_key(key),
                    e,
                )
            }),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PreferencesRepository for KvPreferencesStore {
    async fn load(&self) -> ReelResult<UserPreferences> {
        Ok(self
            .read_json::<UserPreferences>(&self.keys.user())
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, prefs: &UserPreferences) -> ReelResult<()> {
        let payload = serde_json::to_string(prefs)?;
        self.policy
            .write(self.kv.as_ref(), &self.keys.user(), &payload)
            .await
    }

    async fn last_auto_generation(&self) -> ReelResult<Option<DateTime<Utc>>> {
        self.read_json(&self.keys.last_generation()).await
    }

    async fn record_auto_generation(&self, at: DateTime<Utc>) -> ReelResult<()> {
        let payload = serde_json::to_string(&at)?;
        self.policy
            .write(self.kv.as_ref(), &self.keys.last_generation(), &payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKeyValueStore;

    fn store() -> KvPreferencesStore {
        KvPreferencesStore::new(
            Arc::new(InMemoryKeyValueStore::new()),
            StorageKeys::new("test"),
            PersistPolicy::no_delay(1),
        )
    }

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let store = store();
        let prefs = store.load().await.unwrap();
        assert_eq!(prefs, UserPreferences::default());
        assert!(store.last_auto_generation().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = store();
        let prefs = UserPreferences {
            niche: "yoga".to_string(),
            product: "mat".to_string(),
            rotation_counter: 6,
        };
        store.save(&prefs).await.unwrap();
        assert_eq!(store.load().await.unwrap(), prefs);

        let at = Utc::now();
        store.record_auto_generation(at).await.unwrap();
        assert_eq!(store.last_auto_generation().await.unwrap(), Some(at));
    }
}
